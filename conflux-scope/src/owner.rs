//! Owner handles — explicit lifecycle anchors for joined state.
//!
//! An [`Owner`] stands in for one logical consumer instance (one
//! component, one session, one task). Anything that acquires resources on
//! the owner's behalf registers a teardown callback; `dispose` releases
//! them exactly once, in reverse registration order. Dropping the last
//! handle of an undisposed owner also runs the callbacks.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type Teardown = Box<dyn FnOnce() + Send>;

/// A logical consumer instance with scoped teardown.
///
/// Cheap to clone; all clones refer to the same owner. Teardown
/// bookkeeping is expected to happen on one cooperative thread — it is
/// not reentrant-safe against concurrent disposal of the same owner.
#[derive(Clone)]
pub struct Owner {
    inner: Arc<OwnerInner>,
}

struct OwnerInner {
    teardowns: Mutex<Vec<Teardown>>,
    disposed: AtomicBool,
}

impl Owner {
    /// Create a live owner with no registered teardowns.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(OwnerInner {
                teardowns: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Register a callback to run at teardown.
    ///
    /// If the owner is already disposed the callback runs immediately —
    /// a resource acquired after teardown must not outlive it.
    pub fn on_teardown(&self, callback: impl FnOnce() + Send + 'static) {
        if self.inner.disposed.load(Ordering::Acquire) {
            callback();
            return;
        }
        self.inner.teardowns.lock().push(Box::new(callback));
    }

    /// Tear the owner down, running callbacks in reverse registration
    /// order. Subsequent calls are no-ops.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let teardowns = std::mem::take(&mut *self.inner.teardowns.lock());
        tracing::debug!(count = teardowns.len(), "owner teardown");
        for teardown in teardowns.into_iter().rev() {
            teardown();
        }
    }

    /// Whether `dispose` has already run.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl Default for Owner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OwnerInner {
    fn drop(&mut self) {
        if !*self.disposed.get_mut() {
            let teardowns = std::mem::take(self.teardowns.get_mut());
            for teardown in teardowns.into_iter().rev() {
                teardown();
            }
        }
    }
}
