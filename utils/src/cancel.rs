//! Cooperative cancellation tokens.
//!
//! A [`CancellationToken`] is handed to every long-running operation. The
//! owner cancels it with a [`CancelReason`]; the operation observes the
//! cancellation at its next suspension point. Cancellation is first-wins:
//! once a token carries a reason, later `cancel` calls are ignored.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Why an operation was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// A newer request was issued under the same key.
    Superseded,
    /// The owning session was disabled.
    Disabled,
    /// The retry loop was stopped by a state transition.
    RetryStopped,
    /// The process is shutting down.
    Shutdown,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Superseded => "superseded by a newer request",
            Self::Disabled => "session disabled",
            Self::RetryStopped => "retry loop stopped",
            Self::Shutdown => "shutting down",
        };
        f.write_str(s)
    }
}

/// A clonable handle signalling cancellation to an in-flight operation.
///
/// Clones share state: cancelling any clone cancels them all.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    state: Arc<watch::Sender<Option<CancelReason>>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Cancel with `reason`. Returns `false` if already cancelled.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// The reason the token was cancelled with, if any.
    pub fn reason(&self) -> Option<CancelReason> {
        *self.state.borrow()
    }

    /// Whether `other` is a clone of this token.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) -> CancelReason {
        let mut rx = self.state.subscribe();
        loop {
            if let Some(reason) = *rx.borrow_and_update() {
                return reason;
            }
            // The sender lives as long as `self`, so this never errors while
            // we are awaiting; park forever if it somehow does.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Drive `fut` to completion unless the token is cancelled first.
    ///
    /// The token is checked before `fut` is polled and again after it
    /// completes, so an operation that finishes in the same instant it is
    /// cancelled still reports the cancellation.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, CancelReason> {
        if let Some(reason) = self.reason() {
            return Err(reason);
        }
        tokio::select! {
            biased;
            reason = self.cancelled() => Err(reason),
            output = fut => match self.reason() {
                Some(reason) => Err(reason),
                None => Ok(output),
            },
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_cancel_wins() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.cancel(CancelReason::Superseded));
        assert!(!token.cancel(CancelReason::Disabled));
        assert_eq!(token.reason(), Some(CancelReason::Superseded));
    }

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel(CancelReason::Shutdown);
        assert!(token.is_cancelled());
    }

    #[test]
    fn identity_follows_clones() {
        let token = CancellationToken::new();
        assert!(token.same_as(&token.clone()));
        assert!(!token.same_as(&CancellationToken::new()));
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        tokio::task::yield_now().await;
        token.cancel(CancelReason::Disabled);
        assert_eq!(handle.await.unwrap(), CancelReason::Disabled);
    }

    #[tokio::test]
    async fn run_refuses_already_cancelled_token() {
        let token = CancellationToken::new();
        token.cancel(CancelReason::RetryStopped);
        let result = token.run(async { 42 }).await;
        assert_eq!(result, Err(CancelReason::RetryStopped));
    }

    #[tokio::test]
    async fn run_returns_output_when_not_cancelled() {
        let token = CancellationToken::new();
        assert_eq!(token.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn run_interrupts_pending_future() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel(CancelReason::Superseded);
        });
        let result = token
            .run(tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert_eq!(result, Err(CancelReason::Superseded));
    }
}
