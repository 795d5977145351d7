//! Process-wide cancellation signal.

use tokio::sync::watch;

/// A single cancellation signal shared by every watch loop and start-up wait.
///
/// Cloning yields another handle to the same signal. Once cancelled it stays
/// cancelled, and tasks that start waiting afterwards return immediately.
///
/// # Examples
///
/// ```rust
/// use layered_config::notify::CancelSignal;
///
/// # async fn example() {
/// let cancel = CancelSignal::new();
/// let waiter = cancel.clone();
///
/// let task = tokio::spawn(async move { waiter.cancelled().await });
/// cancel.cancel();
/// task.await.unwrap();
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct CancelSignal {
    tx: std::sync::Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    /// Create a signal that has not fired.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    /// Fire the signal.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal fires.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once the value is true.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let cancel = CancelSignal::new();
        let waiter = cancel.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });

        tokio::task::yield_now().await;
        assert!(!cancel.is_cancelled());
        cancel.cancel();

        timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_late_waiter_returns_immediately() {
        let cancel = CancelSignal::new();
        cancel.cancel();
        timeout(Duration::from_millis(100), cancel.cancelled())
            .await
            .unwrap();
    }
}
