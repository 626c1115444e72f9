//! Periodic expiry sweep for the session registry.

use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::registry::SessionRegistry;

/// Handle to a running sweep task. Dropping it cancels the task.
pub struct SweeperHandle {
    cancellation_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Spawns the sweep loop. The task only holds a weak reference, so it
    /// exits on its own once the registry is gone.
    pub fn spawn(registry: Weak<SessionRegistry>, interval: Duration) -> Self {
        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            // Skip the first immediate tick, wait for the first interval
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let Some(registry) = registry.upgrade() else {
                    break;
                };

                let removed = registry.cleanup_expired_sessions();
                if removed > 0 {
                    info!("Session sweep removed {} expired sessions", removed);
                } else {
                    debug!("Session sweep found no expired sessions");
                }
            }

            debug!("Session sweep stopped");
        });

        Self {
            cancellation_token,
            task: Some(task),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Cancels the task and waits for it to exit.
    pub async fn shutdown(mut self) {
        self.cancellation_token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
