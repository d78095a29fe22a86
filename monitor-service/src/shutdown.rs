use std::time::Duration;
use tokio::sync::watch;

/// Creates a linked shutdown handle/signal pair. The handle side triggers,
/// every cloned signal observes.
pub fn channel() -> (ShutdownHandle, Shutdown) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownHandle { sender }, Shutdown { receiver })
}

#[derive(Debug)]
pub struct ShutdownHandle {
    sender: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }
}

/// Cooperative shutdown signal shared by every long-running task. A dropped
/// handle counts as a trigger so tasks never outlive the orchestrator.
#[derive(Debug, Clone)]
pub struct Shutdown {
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once shutdown is requested.
    pub async fn triggered(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleeps for `duration`, waking early on shutdown. Returns false when
    /// interrupted, so loops can use it as their continue condition.
    pub async fn idle(&mut self, duration: Duration) -> bool {
        if self.is_triggered() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.triggered() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn idle_completes_when_not_triggered() {
        let (_handle, mut shutdown) = channel();
        assert!(shutdown.idle(Duration::from_secs(60)).await);
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_wakes_early_on_trigger() {
        let (handle, mut shutdown) = channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.trigger();
        });

        let started = tokio::time::Instant::now();
        assert!(!shutdown.idle(Duration::from_secs(3600)).await);
        assert!(started.elapsed() < Duration::from_secs(3600));
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn dropped_handle_counts_as_trigger() {
        let (handle, mut shutdown) = channel();
        drop(handle);
        assert!(!shutdown.idle(Duration::from_secs(3600)).await);
    }
}
