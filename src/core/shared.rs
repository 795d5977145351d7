//! The single shared configuration instance.

use crate::error::Result;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;

/// The before and after of a successful [`SharedConfig::update`].
#[derive(Debug)]
pub struct Updated<T> {
    /// Configuration before the update
    pub previous: Arc<T>,
    /// Configuration after the update
    pub current: Arc<T>,
}

/// The service's resolved configuration, shared by the host and every watch loop.
///
/// Reads are lock-free: [`get`](Self::get) hands out an `Arc` snapshot that never
/// changes underneath the reader. Writes go through a single gate, apply to a clone,
/// and are published atomically only if they succeed, so concurrent watch loops can
/// never interleave partial merges and readers never see one.
///
/// # Examples
///
/// ```rust
/// use layered_config::core::SharedConfig;
///
/// let config = SharedConfig::new(vec![1, 2]);
/// let updated = config
///     .update(|v| {
///         v.push(3);
///         Ok(())
///     })
///     .unwrap();
///
/// assert_eq!(*updated.previous, vec![1, 2]);
/// assert_eq!(*config.get(), vec![1, 2, 3]);
/// ```
pub struct SharedConfig<T> {
    current: Arc<ArcSwap<T>>,
    write_gate: Arc<Mutex<()>>,
}

impl<T> Clone for SharedConfig<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
            write_gate: Arc::clone(&self.write_gate),
        }
    }
}

impl<T> SharedConfig<T> {
    /// Wrap the initial configuration.
    pub fn new(initial: T) -> Self {
        Self {
            current: Arc::new(ArcSwap::new(Arc::new(initial))),
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// A snapshot of the current configuration.
    pub fn get(&self) -> Arc<T> {
        self.current.load_full()
    }
}

impl<T: Clone> SharedConfig<T> {
    /// Apply `mutate` to a copy of the configuration and publish it.
    ///
    /// If `mutate` fails, nothing is published and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns whatever `mutate` returns.
    pub fn update<F>(&self, mutate: F) -> Result<Updated<T>>
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        let _gate = self.write_gate.lock();
        self.publish(mutate)
    }

    /// Like [`update`](Self::update), then run `then` on the result before the gate is
    /// released.
    ///
    /// Side effects performed by `then` are ordered exactly like the updates that
    /// caused them. `then` must not update this configuration again.
    ///
    /// # Errors
    ///
    /// Returns whatever `mutate` returns; `then` does not run in that case.
    pub fn update_then<F, G, R>(&self, mutate: F, then: G) -> Result<R>
    where
        F: FnOnce(&mut T) -> Result<()>,
        G: FnOnce(&Updated<T>) -> R,
    {
        let _gate = self.write_gate.lock();
        let updated = self.publish(mutate)?;
        Ok(then(&updated))
    }

    /// Caller holds the write gate.
    fn publish<F>(&self, mutate: F) -> Result<Updated<T>>
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        let previous = self.current.load_full();
        let mut next = T::clone(&previous);
        mutate(&mut next)?;

        let current = Arc::new(next);
        self.current.store(Arc::clone(&current));
        Ok(Updated { previous, current })
    }
}
