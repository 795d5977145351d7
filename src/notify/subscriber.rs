//! "Configuration updated" notifications.

use parking_lot::RwLock;
use std::sync::Arc;

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Handle for a subscription that can be dropped to unsubscribe.
pub struct SubscriptionHandle {
    id: usize,
    inner: Arc<RwLock<NotifierInner>>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.inner.write().subscribers.retain(|(id, _)| *id != self.id);
    }
}

struct NotifierInner {
    subscribers: Vec<(usize, Callback)>,
    next_id: usize,
}

/// Signal raised when a writable change was applied that no built-in side effect handles.
///
/// Services subscribe to react to their own writable settings. Callbacks run on the
/// watch loop that applied the change, so they should be quick.
///
/// # Examples
///
/// ```rust
/// use layered_config::notify::UpdateNotifier;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let notifier = UpdateNotifier::new();
/// let hits = Arc::new(AtomicUsize::new(0));
///
/// let counter = Arc::clone(&hits);
/// let handle = notifier.subscribe(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// notifier.notify_all();
/// drop(handle);
/// notifier.notify_all();
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct UpdateNotifier {
    inner: Arc<RwLock<NotifierInner>>,
}

impl UpdateNotifier {
    /// Create a notifier with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(NotifierInner {
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Register a callback. Dropping the returned handle unsubscribes it.
    #[must_use = "dropping the handle unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, Arc::new(callback)));

        SubscriptionHandle {
            id,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Invoke every callback in subscription order.
    pub fn notify_all(&self) {
        // Snapshot so callbacks may subscribe or unsubscribe without deadlocking.
        let callbacks: Vec<Callback> = self
            .inner
            .read()
            .subscribers
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.read().subscribers.len()
    }
}

impl Default for UpdateNotifier {
    fn default() -> Self {
        Self::new()
    }
}
