//! Shutdown coordination.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

/// Coordinator for graceful shutdown.
///
/// Every long-running task holds a receiver and exits when the signal
/// arrives; dropping the receiver is how a task reports that it is done.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Broadcast the signal. Idempotent.
    pub fn trigger(&self) {
        let tasks = self.tx.send(()).unwrap_or(0);
        tracing::info!(tasks, "Shutdown triggered");
    }

    /// Receivers still alive, i.e. tasks that have not finished.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Wait until every subscribed task has finished or `deadline` passes.
    /// Returns false on timeout.
    pub async fn drain(&self, deadline: Duration) -> bool {
        let until = Instant::now() + deadline;
        while self.receiver_count() > 0 {
            if Instant::now() >= until {
                tracing::warn!(remaining = self.receiver_count(), "Shutdown deadline reached with tasks still running");
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_waits_for_tasks() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = rx.recv().await;
        });

        assert_eq!(shutdown.receiver_count(), 1);
        shutdown.trigger();
        assert!(shutdown.drain(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_drain_times_out() {
        let shutdown = Shutdown::new();
        let _held = shutdown.subscribe();
        shutdown.trigger();
        assert!(!shutdown.drain(Duration::from_millis(20)).await);
    }
}
