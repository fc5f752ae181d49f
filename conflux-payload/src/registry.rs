//! The action registry — a many-to-many relation between middleware and
//! the action names that trigger them.

use crate::payload::Payload;
use conflux_core::{ActionName, Middleware};
use std::collections::HashSet;
use std::sync::Arc;

/// One registered middleware and the names it subscribes to.
///
/// Invariant: `names` is never empty — deregistering a middleware's last
/// name drops the entry entirely.
struct Entry {
    middleware: Arc<dyn Middleware<Payload>>,
    names: HashSet<ActionName>,
}

/// Ordered registry of middleware keyed by action-name sets.
///
/// Entries keep registration order; dispatch composes matching middleware
/// in that order. Middleware identity is `Arc` pointer identity — the
/// same `Arc` registered under several names still occupies one entry.
pub struct ActionRegistry {
    entries: Vec<Entry>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Associate `middleware` with each of `names`.
    ///
    /// A middleware already present (by pointer identity) has the names
    /// added to its existing entry; its position is unchanged.
    pub fn register(&mut self, names: &[ActionName], middleware: Arc<dyn Middleware<Payload>>) {
        if names.is_empty() {
            return;
        }
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| Arc::ptr_eq(&entry.middleware, &middleware))
        {
            entry.names.extend(names.iter().cloned());
            return;
        }
        self.entries.push(Entry {
            middleware,
            names: names.iter().cloned().collect(),
        });
    }

    /// Remove the association between `middleware` and each of `names`.
    /// An entry whose name-set becomes empty is dropped.
    pub fn deregister(&mut self, names: &[ActionName], middleware: &Arc<dyn Middleware<Payload>>) {
        for entry in &mut self.entries {
            if Arc::ptr_eq(&entry.middleware, middleware) {
                for name in names {
                    entry.names.remove(name);
                }
            }
        }
        self.entries.retain(|entry| !entry.names.is_empty());
    }

    /// Every middleware whose name-set intersects `names`, in
    /// registration order. Each middleware appears at most once even if
    /// it matches several of the requested names.
    #[must_use]
    pub fn matching(&self, names: &[ActionName]) -> Vec<Arc<dyn Middleware<Payload>>> {
        self.entries
            .iter()
            .filter(|entry| names.iter().any(|name| entry.names.contains(name)))
            .map(|entry| Arc::clone(&entry.middleware))
            .collect()
    }

    /// Number of registered middleware.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no middleware are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
