use crate::shutdown::Shutdown;
use birdwatch_core::{BotError, PostingConfig};
use llm_interface::ContentGenerator;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use twitter_client::{CredentialCoordinator, Platform};

const ERROR_COOLDOWN: Duration = Duration::from_secs(15 * 60);

/// Posts generated original content on a fixed cadence, with or without an
/// image depending on the configured probability.
pub struct PostScheduler {
    gateway: Arc<dyn Platform>,
    auth: Arc<CredentialCoordinator>,
    generator: Arc<dyn ContentGenerator>,
    config: PostingConfig,
}

impl PostScheduler {
    pub fn new(
        gateway: Arc<dyn Platform>,
        auth: Arc<CredentialCoordinator>,
        generator: Arc<dyn ContentGenerator>,
        config: PostingConfig,
    ) -> Self {
        Self {
            gateway,
            auth,
            generator,
            config,
        }
    }

    pub async fn run(&self, mut shutdown: Shutdown) {
        info!(
            "Starting post scheduler (interval: {} hours)",
            self.config.interval_hours
        );
        loop {
            if shutdown.is_triggered() {
                break;
            }
            let pause = match self.post_once().await {
                Ok(posted_id) => {
                    info!("Posted scheduled tweet {}", posted_id);
                    Duration::from_secs(self.config.interval_hours * 60 * 60)
                }
                Err(e) => {
                    error!("Error in scheduled post: {}", e);
                    ERROR_COOLDOWN
                }
            };
            if !shutdown.idle(pause).await {
                break;
            }
        }
        info!("Post scheduler stopped");
    }

    async fn post_once(&self) -> Result<String, BotError> {
        if let Err(e) = self.auth.ensure_fresh().await {
            warn!(
                "Credential refresh failed, continuing with last snapshot: {}",
                e
            );
        }

        if fastrand::f64() < self.config.image_probability {
            info!("Generating scheduled tweet with image");
            let post = self.generator.generate_post_with_image().await?;
            let mut media_ids = Vec::new();
            if let Some(image) = post.image {
                media_ids.push(self.gateway.upload_media(image).await?);
            }
            self.gateway.post(&post.text, None, &media_ids).await
        } else {
            info!("Generating scheduled tweet without image");
            let text = self.generator.generate_post().await?;
            self.gateway.post(&text, None, &[]).await
        }
    }
}
