use birdwatch_core::{BotConfig, BotError};
use llm_interface::OpenAiGenerator;
use monitor_service::{shutdown, MonitorSystem};
use std::sync::Arc;
use twitter_client::{CredentialCoordinator, CredentialStore, TwitterGateway};

#[tokio::main]
async fn main() -> Result<(), BotError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "birdwatch=info,monitor_service=info,twitter_client=info,llm_interface=info",
                )
            }),
        )
        .init();

    tracing::info!("Starting Birdwatch");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "birdwatch.json".to_string());
    let config = BotConfig::load(&config_path)?;

    let store = CredentialStore::new(&config.credentials_path);
    let auth = Arc::new(CredentialCoordinator::new(store)?);
    let gateway = Arc::new(TwitterGateway::new(auth.clone()));
    let generator = Arc::new(OpenAiGenerator::new(
        config.llm.clone(),
        config.prompts.clone(),
    )?);

    let system = MonitorSystem::new(config, gateway, auth, generator);

    let (handle, signal) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            handle.trigger();
        }
    });

    system.run(signal).await
}
