use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a [`Context`] is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Request-scoped cancellation handle passed to services.
///
/// Cancelling a parent token cancels every context derived from it. The
/// deadline is advisory: it is reported by [`Context::err`] and awaited by
/// [`Context::done`], but reaching it does not cancel the token.
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_timeout(parent: &CancellationToken, timeout: Duration) -> Self {
        Self::with_deadline(parent, Instant::now() + timeout)
    }

    pub fn with_deadline(parent: &CancellationToken, deadline: Instant) -> Self {
        Self {
            token: parent.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn err(&self) -> Option<ContextError> {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(ContextError::DeadlineExceeded);
        }
        if self.token.is_cancelled() {
            return Some(ContextError::Canceled);
        }
        None
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
                    _ = self.token.cancelled() => ContextError::Canceled,
                }
            }
            None => {
                self.token.cancelled().await;
                ContextError::Canceled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn background_is_never_done() {
        let ctx = Context::background();
        assert!(ctx.err().is_none());
        assert!(ctx.deadline().is_none());
    }

    #[tokio::test]
    async fn parent_cancellation_propagates() {
        let parent = CancellationToken::new();
        let ctx = Context::with_timeout(&parent, Duration::from_secs(60));
        parent.cancel();
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
        assert_eq!(ctx.done().await, ContextError::Canceled);
    }

    #[tokio::test]
    async fn cancelling_child_leaves_parent_alone() {
        let parent = CancellationToken::new();
        let ctx = Context::with_timeout(&parent, Duration::from_secs(60));
        ctx.cancel();
        assert!(ctx.is_done());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_reports_exceeded() {
        let ctx = Context::with_timeout(&CancellationToken::new(), Duration::from_millis(50));
        assert!(ctx.err().is_none());

        assert_eq!(ctx.done().await, ContextError::DeadlineExceeded);
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_wins_over_cancellation() {
        let parent = CancellationToken::new();
        let ctx = Context::with_timeout(&parent, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(20)).await;
        parent.cancel();
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }
}
