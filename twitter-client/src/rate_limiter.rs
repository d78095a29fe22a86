use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(2);

/// Enforces a minimum spacing between outbound API calls. One governor is
/// shared by every caller that goes through the gateway, so the spacing
/// holds across all producers and the reply worker together.
#[derive(Debug)]
pub struct RateGovernor {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateGovernor {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Waits until at least `min_interval` has elapsed since the previous
    /// call across all callers, then records the new call time. The slot is
    /// reserved while the lock is held, so two concurrent callers can never
    /// observe the same last-call time and proceed together.
    pub async fn throttle(&self) {
        let slot = {
            let mut last_call = self.last_call.lock().await;
            let now = Instant::now();
            let slot = match *last_call {
                Some(previous) if previous + self.min_interval > now => {
                    previous + self.min_interval
                }
                _ => now,
            };
            *last_call = Some(slot);
            slot
        };
        sleep_until(slot).await;
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn first_call_does_not_wait() {
        let governor = RateGovernor::default();
        let before = Instant::now();
        governor.throttle().await;
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_calls_are_spaced() {
        let governor = RateGovernor::new(Duration::from_secs(2));
        governor.throttle().await;
        let first = Instant::now();
        governor.throttle().await;
        let second = Instant::now();
        assert!(second - first >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_are_spaced() {
        let governor = Arc::new(RateGovernor::new(Duration::from_secs(2)));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let governor = governor.clone();
            handles.push(tokio::spawn(async move {
                governor.throttle().await;
                Instant::now()
            }));
        }

        let mut completions = Vec::new();
        for handle in handles {
            completions.push(handle.await.unwrap());
        }
        completions.sort();

        for pair in completions.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(2));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn spacing_resets_after_idle_period() {
        let governor = RateGovernor::new(Duration::from_secs(2));
        governor.throttle().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        let before = Instant::now();
        governor.throttle().await;
        assert_eq!(Instant::now(), before);
    }
}
