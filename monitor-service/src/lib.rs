pub mod producers;
pub mod queue;
pub mod scheduler;
pub mod seen_set;
pub mod shutdown;
pub mod worker;


use crate::producers::ProducerContext;
use crate::queue::ReplyQueue;
use crate::scheduler::PostScheduler;
use crate::seen_set::SeenSet;
use crate::shutdown::Shutdown;
use crate::worker::ReplyWorker;
use birdwatch_core::{BotConfig, BotError};
use llm_interface::ContentGenerator;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info};
use twitter_client::{CredentialCoordinator, Platform};

/// Owns the full monitoring pipeline: three poll producers, the reply
/// worker, the credential refresh loop and the post scheduler. All shared
/// state is constructed here once and handed to each task.
pub struct MonitorSystem {
    config: BotConfig,
    gateway: Arc<dyn Platform>,
    auth: Arc<CredentialCoordinator>,
    generator: Arc<dyn ContentGenerator>,
}

impl MonitorSystem {
    pub fn new(
        config: BotConfig,
        gateway: Arc<dyn Platform>,
        auth: Arc<CredentialCoordinator>,
        generator: Arc<dyn ContentGenerator>,
    ) -> Self {
        Self {
            config,
            gateway,
            auth,
            generator,
        }
    }

    /// Runs every loop until `shutdown` triggers, then joins the tasks and
    /// persists the seen-set. Tasks finish their current cycle; in-flight
    /// network calls complete or fail naturally.
    pub async fn run(&self, shutdown: Shutdown) -> Result<(), BotError> {
        let our_user_id = self.gateway.me().await?;
        info!("Authenticated as user id: {}", our_user_id);

        let seen = Arc::new(Mutex::new(SeenSet::load(&self.config.seen_tweets_path)));
        let queue = Arc::new(ReplyQueue::new());

        let ctx = ProducerContext {
            gateway: self.gateway.clone(),
            auth: self.auth.clone(),
            seen: seen.clone(),
            queue: queue.clone(),
            config: self.config.monitoring.clone(),
            our_user_id,
        };

        let mut tasks = JoinSet::new();
        tasks.spawn(refresh_loop(self.auth.clone(), shutdown.clone()));
        tasks.spawn(producers::run_mentions_producer(ctx.clone(), shutdown.clone()));
        tasks.spawn(producers::run_hashtags_producer(ctx.clone(), shutdown.clone()));
        tasks.spawn(producers::run_keywords_producer(ctx.clone(), shutdown.clone()));

        let worker = ReplyWorker::new(
            self.gateway.clone(),
            self.auth.clone(),
            queue.clone(),
            self.generator.clone(),
            self.config.prompts.fallback_reply.clone(),
        );
        let worker_shutdown = shutdown.clone();
        tasks.spawn(async move { worker.run(worker_shutdown).await });

        if self.config.posting.enabled {
            let scheduler = PostScheduler::new(
                self.gateway.clone(),
                self.auth.clone(),
                self.generator.clone(),
                self.config.posting.clone(),
            );
            let scheduler_shutdown = shutdown.clone();
            tasks.spawn(async move { scheduler.run(scheduler_shutdown).await });
        }

        info!("All monitoring tasks started");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Monitoring task panicked: {}", e);
            }
        }

        let seen = seen.lock().unwrap();
        if let Err(e) = seen.persist() {
            error!("Error saving seen tweets on shutdown: {}", e);
        }
        info!("Monitoring system stopped");
        Ok(())
    }
}

/// Periodic credential check independent of the producer and worker cycles;
/// refresh is idempotent, so the overlap is harmless.
async fn refresh_loop(auth: Arc<CredentialCoordinator>, mut shutdown: Shutdown) {
    const CHECK_INTERVAL: Duration = Duration::from_secs(30 * 60);
    const ERROR_COOLDOWN: Duration = Duration::from_secs(5 * 60);

    info!("Starting credential refresh loop");
    loop {
        if shutdown.is_triggered() {
            break;
        }
        let pause = match auth.ensure_fresh().await {
            Ok(refreshed) => {
                if refreshed {
                    info!("Credentials refreshed");
                }
                CHECK_INTERVAL
            }
            Err(e) => {
                error!("Error checking/refreshing credentials: {}", e);
                ERROR_COOLDOWN
            }
        };
        if !shutdown.idle(pause).await {
            break;
        }
    }
    info!("Credential refresh loop stopped");
}
