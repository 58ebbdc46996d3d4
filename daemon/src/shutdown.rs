//! Graceful shutdown on SIGINT/SIGTERM.
//!
//! Long-running commands hold a clone of the controller's
//! [`CancellationToken`] and stop at their next suspension point once a
//! signal arrives.

use modhub_utils::{CancelReason, CancellationToken};
use tokio::signal;

/// Turns OS signals into a cancelled token.
pub struct ShutdownController {
    token: CancellationToken,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// A token that is cancelled with [`CancelReason::Shutdown`] on shutdown.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trigger shutdown programmatically.
    pub fn shutdown(&self) {
        self.token.cancel(CancelReason::Shutdown);
    }

    /// Wait for SIGTERM or SIGINT, then trigger shutdown.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("received SIGINT, shutting down"); }
            _ = terminate => { tracing::info!("received SIGTERM, shutting down"); }
        }

        self.shutdown();
    }

    /// Spawn a task that waits for a signal and returns the shared token.
    pub fn install() -> CancellationToken {
        let controller = Self::new();
        let token = controller.token();
        tokio::spawn(async move { controller.wait_for_signal().await });
        token
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn programmatic_shutdown_cancels_token() {
        let controller = ShutdownController::new();
        let token = controller.token();
        controller.shutdown();
        assert_eq!(token.cancelled().await, CancelReason::Shutdown);
    }

    #[test]
    fn all_tokens_share_state() {
        let controller = ShutdownController::new();
        let a = controller.token();
        let b = controller.token();
        controller.shutdown();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }
}
