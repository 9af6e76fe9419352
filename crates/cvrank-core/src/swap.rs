//! Swap-on-publish snapshot cell.
//!
//! Readers clone an `Arc` to the current snapshot and never block each
//! other; writers build a replacement off-path and publish it whole, so a
//! reader observes either the old or the new state, never a partial one.

use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug)]
pub struct SwapCell<T> {
    inner: RwLock<Option<Arc<T>>>,
}

impl<T> SwapCell<T> {
    pub fn empty() -> Self {
        Self { inner: RwLock::new(None) }
    }

    pub fn new(value: T) -> Self {
        Self { inner: RwLock::new(Some(Arc::new(value))) }
    }

    /// Current snapshot, if one has been published.
    pub fn load(&self) -> Option<Arc<T>> {
        self.inner.read().clone()
    }

    /// Atomically replace the snapshot with a fully-built value.
    pub fn publish(&self, value: T) {
        *self.inner.write() = Some(Arc::new(value));
    }

    pub fn is_published(&self) -> bool {
        self.inner.read().is_some()
    }
}

impl<T> Default for SwapCell<T> {
    fn default() -> Self {
        Self::empty()
    }
}
