//! Ambient context — a keyed binding registry with scoped lookup.
//!
//! A [`Context`] is one node in an ownership tree. Values published at a
//! node are visible to that node and every descendant derived with
//! [`Context::child`]; lookups walk from the node toward the root and
//! return the nearest match. This is deliberately an explicit handle
//! passed down the tree — there is no hidden global table.

use conflux_core::ScopeError;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// One node in the ambient-context tree.
///
/// Cheap to clone; clones alias the same node. Publishing the same key
/// twice at one node replaces the earlier value; publishing at a child
/// shadows the ancestor's value for that subtree.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    parent: Option<Context>,
    entries: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl Context {
    /// Create a root node with no parent.
    pub fn root() -> Self {
        Self::node(None)
    }

    /// Derive a child node. Lookups in the child fall back to this node.
    pub fn child(&self) -> Self {
        Self::node(Some(self.clone()))
    }

    fn node(parent: Option<Context>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                parent,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Publish `value` under `key` at this node, making it discoverable
    /// to this node and its descendants.
    pub fn publish<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        self.inner.entries.lock().insert(key.into(), Arc::new(value));
    }

    /// Look up the nearest value published under `key`, walking from
    /// this node to the root. An entry of a different type is treated as
    /// absent at that node and the walk continues upward.
    pub fn lookup<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            let found = node.inner.entries.lock().get(key).cloned();
            if let Some(value) = found {
                if let Some(typed) = value.downcast_ref::<T>() {
                    return Some(typed.clone());
                }
            }
            current = node.inner.parent.clone();
        }
        None
    }

    /// Like [`lookup`](Context::lookup), but a missing value is a
    /// [`ScopeError::MissingProvider`] naming the key.
    pub fn require<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Result<T, ScopeError> {
        self.lookup(key).ok_or_else(|| ScopeError::MissingProvider {
            key: key.to_string(),
        })
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::root()
    }
}
