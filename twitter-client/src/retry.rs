use birdwatch_core::BotError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy for gateway operations: a bounded number of attempts with
/// capped exponential backoff, retrying only the errors the predicate
/// accepts. Everything else propagates to the caller immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts in total, including the first.
    pub max_attempts: u32,
    /// Backoff before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single backoff wait.
    pub max_delay: Duration,
    /// Growth factor between consecutive waits.
    pub multiplier: f64,
    retryable: fn(&BotError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            retryable: BotError::is_rate_limited,
        }
    }
}

impl RetryPolicy {
    /// Policy matched to the platform API: retry rate-limit responses only.
    pub fn twitter() -> Self {
        Self::default()
    }

    /// Backoff before retry number `retry` (zero-based): 4s, 8s, 16s, ...
    /// capped at `max_delay`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry as i32);
        let delay = self.base_delay.mul_f64(factor);
        delay.min(self.max_delay)
    }

    /// Runs `operation`, retrying while the policy's predicate accepts the
    /// error and attempts remain. Each wait is logged.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, BotError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, BotError>>,
    {
        let mut attempts = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempts > 0 {
                        debug!("{} succeeded after {} retries", operation_name, attempts);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    attempts += 1;
                    if attempts >= self.max_attempts || !(self.retryable)(&error) {
                        return Err(error);
                    }
                    let delay = self.delay_for_retry(attempts - 1);
                    warn!(
                        "Rate limit hit on {}, waiting {:?} before retry {}",
                        operation_name, delay, attempts
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
