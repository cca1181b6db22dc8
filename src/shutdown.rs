//! Graceful shutdown coordination.
//!
//! A [`ShutdownSignal`] is cloned into each consumer loop; when a
//! termination signal (SIGTERM, SIGINT) arrives, every loop is notified,
//! finishes its in-flight batch, and exits. Unacknowledged messages are
//! redelivered by their queue, so stopping mid-stream loses nothing.

use tokio::sync::broadcast;
use tracing::info;

/// A signal for coordinating graceful shutdown across the consumer loops.
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    /// Wait for SIGTERM or SIGINT, then notify all subscribers.
    pub async fn wait(&self) {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("received Ctrl+C, initiating graceful shutdown");
            }
            _ = terminate => {
                info!("received SIGTERM, initiating graceful shutdown");
            }
        }

        let _ = self.sender.send(());
    }

    /// Subscribe to shutdown notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Trigger shutdown programmatically (used by tests).
    pub fn trigger(&self) {
        let _ = self.sender.send(());
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_notifies_subscriber() {
        let signal = ShutdownSignal::new();
        let mut receiver = signal.subscribe();

        let trigger_signal = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger_signal.trigger();
        });

        let result = tokio::time::timeout(Duration::from_millis(200), receiver.recv()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_clones_share_the_signal() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();

        let mut receiver1 = signal.subscribe();
        let mut receiver2 = clone.subscribe();

        signal.trigger();

        assert!(receiver1.recv().await.is_ok());
        assert!(receiver2.recv().await.is_ok());
    }
}
