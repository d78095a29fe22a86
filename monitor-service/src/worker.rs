use crate::queue::ReplyQueue;
use crate::shutdown::Shutdown;
use chrono::Utc;
use llm_interface::ContentGenerator;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use twitter_client::{CredentialCoordinator, Platform};

const EMPTY_QUEUE_PAUSE: Duration = Duration::from_secs(60);
const INELIGIBLE_PAUSE: Duration = Duration::from_secs(5);
const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(15 * 60);
const JITTER_MIN_SECS: u64 = 5;
const JITTER_MAX_SECS: u64 = 15;

/// What a single worker step did; drives the pacing of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStep {
    QueueEmpty,
    NotYetEligible,
    Posted,
    Dropped,
    RateLimited,
}

/// Single consumer of the reply queue: generates a reply for each eligible
/// task and posts it through the gateway. Per-item failures never stop the
/// loop; the outcome of each step only selects the next pause.
pub struct ReplyWorker {
    gateway: Arc<dyn Platform>,
    auth: Arc<CredentialCoordinator>,
    queue: Arc<ReplyQueue>,
    generator: Arc<dyn ContentGenerator>,
    fallback_reply: String,
}

impl ReplyWorker {
    pub fn new(
        gateway: Arc<dyn Platform>,
        auth: Arc<CredentialCoordinator>,
        queue: Arc<ReplyQueue>,
        generator: Arc<dyn ContentGenerator>,
        fallback_reply: String,
    ) -> Self {
        Self {
            gateway,
            auth,
            queue,
            generator,
            fallback_reply,
        }
    }

    pub async fn run(&self, mut shutdown: Shutdown) {
        info!("Starting reply worker");
        loop {
            if shutdown.is_triggered() {
                break;
            }
            let pause = match self.step().await {
                WorkerStep::QueueEmpty => EMPTY_QUEUE_PAUSE,
                WorkerStep::NotYetEligible => INELIGIBLE_PAUSE,
                WorkerStep::RateLimited => RATE_LIMIT_COOLDOWN,
                WorkerStep::Posted | WorkerStep::Dropped => post_jitter(),
            };
            if !shutdown.idle(pause).await {
                break;
            }
        }
        info!("Reply worker stopped");
    }

    /// Processes at most one queued task.
    pub async fn step(&self) -> WorkerStep {
        if let Err(e) = self.auth.ensure_fresh().await {
            warn!(
                "Credential refresh failed, continuing with last snapshot: {}",
                e
            );
        }

        let Some(task) = self.queue.pop() else {
            debug!("Reply queue is empty");
            return WorkerStep::QueueEmpty;
        };

        let now = Utc::now();
        if !task.is_eligible(now) {
            let wait = task.eligible_at() - now;
            debug!(
                "Not time to reply to tweet {} yet, waiting {} more minutes",
                task.tweet_id,
                wait.num_minutes()
            );
            self.queue.requeue(task);
            return WorkerStep::NotYetEligible;
        }

        info!("Processing tweet {} from reply queue", task.tweet_id);
        let reply_text = match self.generator.generate_reply(&task.text).await {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Reply generation failed for tweet {}, using fallback: {}",
                    task.tweet_id, e
                );
                self.fallback_reply.clone()
            }
        };

        if task.is_reply_to_us {
            info!("Replying to a comment on our own tweet {}", task.tweet_id);
        }
        match self
            .gateway
            .post(&reply_text, Some(&task.tweet_id), &[])
            .await
        {
            Ok(posted_id) => {
                info!("Posted reply {} to tweet {}", posted_id, task.tweet_id);
                WorkerStep::Posted
            }
            Err(e) if e.is_forbidden() => {
                warn!(
                    "Tweet {} restricts replies, skipping: {}",
                    task.tweet_id, e
                );
                WorkerStep::Dropped
            }
            Err(e) if e.is_rate_limited() => {
                warn!(
                    "Rate limit exceeded when replying to {}, re-enqueueing: {}",
                    task.tweet_id, e
                );
                self.queue.requeue(task);
                WorkerStep::RateLimited
            }
            Err(e) => {
                error!("Error posting reply to tweet {}: {}", task.tweet_id, e);
                WorkerStep::Dropped
            }
        }
    }
}

/// Small random pause between processed items to avoid bursty posting.
fn post_jitter() -> Duration {
    Duration::from_secs(fastrand::u64(JITTER_MIN_SECS..=JITTER_MAX_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_in_range() {
        for _ in 0..50 {
            let jitter = post_jitter();
            assert!(jitter >= Duration::from_secs(JITTER_MIN_SECS));
            assert!(jitter <= Duration::from_secs(JITTER_MAX_SECS));
        }
    }
}
