//! Per-request cancellation context.
//!
//! Every public facade operation takes a [`CallContext`]; all suspension
//! points observe it. The context distinguishes plain cancellation
//! (client went away) from a passed deadline, so the two map to their
//! respective transport codes.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

/// Cancellation scope of one request.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that only ends when [`Self::cancel`] is called.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that additionally ends after `timeout`.
    #[must_use]
    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Cancel the request.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the context has fired.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the context fires; pending forever otherwise.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.cancel.cancelled() => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }

    /// The transport error matching what fired.
    #[must_use]
    pub fn error(&self) -> ApiError {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            ApiError::DeadlineExceeded
        } else {
            ApiError::Canceled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_fires_done() {
        let ctx = CallContext::new();
        assert!(!ctx.is_done());
        ctx.cancel();
        assert!(ctx.is_done());
        ctx.done().await;
        assert_eq!(ctx.error(), ApiError::Canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fires_done_with_deadline_exceeded() {
        let ctx = CallContext::with_deadline(Duration::from_millis(50));
        assert!(!ctx.is_done());
        ctx.done().await;
        assert!(ctx.is_done());
        assert_eq!(ctx.error(), ApiError::DeadlineExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_beats_a_far_deadline() {
        let ctx = CallContext::with_deadline(Duration::from_secs(3600));
        let waiter = ctx.clone();
        let handle = tokio::spawn(async move {
            waiter.done().await;
            waiter.error()
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        ctx.cancel();
        let err = handle.await.expect("join");
        assert_eq!(err, ApiError::Canceled);
    }
}
