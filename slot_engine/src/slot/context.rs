//! Per-call cancellation and deadline signal.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use super::errors::{SpinError, SpinResult};

/// Call context handed to [`SpinEngine::settle`](super::SpinEngine::settle).
///
/// Carries an optional cancel signal and an optional deadline. Either one
/// firing before commit rolls the attempt back, and neither is retried.
#[derive(Debug, Clone, Default)]
pub struct SettleContext {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Cancels every [`SettleContext`] derived from it
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl SettleContext {
    /// Context that never cancels and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Context plus the handle that cancels it
    pub fn cancellable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            cancel: Some(rx),
            deadline: None,
        };
        (ctx, CancelHandle { tx })
    }

    /// Set a deadline. An earlier existing deadline wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Set a deadline `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check; cancellation is reported ahead of an expired deadline
    pub fn check(&self) -> SpinResult<()> {
        if let Some(rx) = &self.cancel
            && *rx.borrow()
        {
            return Err(SpinError::Cancelled);
        }

        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(SpinError::DeadlineExceeded);
        }

        Ok(())
    }

    /// Resolves once the context is cancelled or its deadline passes.
    /// Pending forever for a background context.
    pub async fn done(&self) -> SpinError {
        let cancelled = async {
            match self.cancel.clone() {
                Some(mut rx) => {
                    // Err means the handle was dropped without cancelling
                    let dropped = rx.wait_for(|cancelled| *cancelled).await.is_err();
                    if dropped {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => SpinError::Cancelled,
            _ = expired => SpinError::DeadlineExceeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_never_fires() {
        let ctx = SettleContext::background();
        assert!(ctx.check().is_ok());

        let fired = tokio::time::timeout(Duration::from_millis(20), ctx.done()).await;
        assert!(fired.is_err());
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let (ctx, handle) = SettleContext::cancellable();
        assert!(ctx.check().is_ok());

        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.done().await })
        };
        handle.cancel();

        let err = waiter.await.unwrap();
        assert!(matches!(err, SpinError::Cancelled));
        assert!(matches!(ctx.check(), Err(SpinError::Cancelled)));
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_cancel() {
        let (ctx, handle) = SettleContext::cancellable();
        drop(handle);

        assert!(ctx.check().is_ok());
        let fired = tokio::time::timeout(Duration::from_millis(20), ctx.done()).await;
        assert!(fired.is_err());
    }

    #[tokio::test]
    async fn test_deadline_expires() {
        let ctx = SettleContext::background().with_timeout(Duration::from_millis(10));

        let err = ctx.done().await;
        assert!(matches!(err, SpinError::DeadlineExceeded));
        assert!(matches!(ctx.check(), Err(SpinError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_earlier_deadline_wins() {
        let soon = Instant::now() + Duration::from_millis(5);
        let later = soon + Duration::from_secs(60);

        let ctx = SettleContext::background()
            .with_deadline(soon)
            .with_deadline(later);
        assert_eq!(ctx.deadline(), Some(soon));
    }
}
