//! Shutdown signalling for the listener and its tasks.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long [`ShutdownCoordinator::drain`] waits by default.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the cancellation token the serve loop watches.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    /// New coordinator, not yet cancelled.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Override how long [`drain`](Self::drain) waits.
    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// A clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Signal shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been signalled.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve on ctrl-c or when shutdown is signalled elsewhere, then cancel.
    pub async fn wait_for_signal(&self) -> std::io::Result<()> {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                info!("ctrl-c received");
            }
            () = self.token.cancelled() => {}
        }
        self.shutdown();
        Ok(())
    }

    /// Signal shutdown and wait for `handles` to finish.
    ///
    /// Returns `false` if the drain timeout elapsed first.
    pub async fn drain(&self, handles: Vec<JoinHandle<()>>) -> bool {
        self.shutdown();
        info!(
            task_count = handles.len(),
            timeout_secs = self.drain_timeout.as_secs(),
            "draining tasks"
        );
        let finished = tokio::time::timeout(self.drain_timeout, futures::future::join_all(handles))
            .await
            .is_ok();
        if !finished {
            warn!(timeout = ?self.drain_timeout, "drain timed out, tasks may still be running");
        }
        finished
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
