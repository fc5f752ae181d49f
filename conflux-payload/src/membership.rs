//! Joining a container: modes, options, and the membership handle.

use crate::payload::{PAYLOAD_KEY, Payload, fold_default};
use conflux_core::{ActionName, Middleware, ScopeError};
use conflux_scope::{Context, Owner};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// How a join acquires its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// Always allocate a fresh container.
    Create,
    /// Require a container published by an ancestor scope; failing that
    /// is a fatal [`ScopeError::MissingProvider`].
    Inherit,
    /// Inherit if an ancestor published one, otherwise create.
    Auto,
}

/// Options for [`Payload::join`].
#[derive(Debug, Clone)]
pub struct JoinOptions {
    /// Acquisition mode.
    pub mode: JoinMode,
    /// Ambient-context key for inherit lookups.
    pub key: String,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            mode: JoinMode::Create,
            key: PAYLOAD_KEY.to_string(),
        }
    }
}

impl JoinOptions {
    /// Create-mode options with the default key.
    pub fn create() -> Self {
        Self::default()
    }

    /// Inherit-mode options with the default key.
    pub fn inherit() -> Self {
        Self {
            mode: JoinMode::Inherit,
            ..Self::default()
        }
    }

    /// Auto-mode options with the default key.
    pub fn auto() -> Self {
        Self {
            mode: JoinMode::Auto,
            ..Self::default()
        }
    }

    /// Override the ambient-context key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

static NEXT_CONTRIBUTION_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_contribution_id() -> u64 {
    NEXT_CONTRIBUTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// One owner's participation in a shared container.
///
/// Joining records the owner's initial-value contribution and wires
/// [`leave`](Membership::leave) into the owner's teardown. Middleware
/// registered through the membership are deregistered on leave; the
/// contribution is removed and keys unique to it are deleted from the
/// live container.
#[derive(Clone)]
pub struct Membership {
    inner: Arc<MembershipInner>,
}

impl std::fmt::Debug for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Membership")
            .field("contribution", &self.inner.contribution)
            .field("left", &self.inner.left.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

struct MembershipInner {
    payload: Payload,
    contribution: u64,
    registered: Mutex<Vec<(Arc<dyn Middleware<Payload>>, Vec<ActionName>)>>,
    left: AtomicBool,
}

impl Payload {
    /// Join a container as `owner`, contributing `initial` values.
    ///
    /// `initial` must be a JSON object (or null for no contribution).
    /// The returned [`Membership`] is the owner's handle; its `leave`
    /// runs automatically at the owner's teardown.
    pub fn join(
        owner: &Owner,
        ctx: &Context,
        initial: Value,
        options: JoinOptions,
    ) -> Result<Membership, ScopeError> {
        let initial = into_object(initial);
        let payload = match options.mode {
            JoinMode::Create => Payload::new(),
            JoinMode::Inherit => ctx.require::<Payload>(&options.key)?,
            JoinMode::Auto => ctx.lookup::<Payload>(&options.key).unwrap_or_default(),
        };
        let contribution = payload.add_contribution(initial);
        let membership = Membership {
            inner: Arc::new(MembershipInner {
                payload,
                contribution,
                registered: Mutex::new(Vec::new()),
                left: AtomicBool::new(false),
            }),
        };
        let handle = membership.clone();
        owner.on_teardown(move || handle.leave());
        Ok(membership)
    }
}

impl Membership {
    /// The shared container this membership participates in.
    pub fn payload(&self) -> &Payload {
        &self.inner.payload
    }

    /// Register middleware owned by this membership. Owned middleware
    /// are deregistered automatically on [`leave`](Membership::leave).
    pub fn on(&self, names: &[ActionName], middleware: Arc<dyn Middleware<Payload>>) {
        let names = fold_default(names);
        self.inner.payload.on(&names, Arc::clone(&middleware));
        self.inner.registered.lock().push((middleware, names));
    }

    /// Deregister membership-owned middleware from the given names.
    pub fn off(&self, names: &[ActionName], middleware: &Arc<dyn Middleware<Payload>>) {
        let names = fold_default(names);
        self.inner.payload.off(&names, middleware);
        let mut registered = self.inner.registered.lock();
        for (tracked_mw, tracked_names) in registered.iter_mut() {
            if Arc::ptr_eq(tracked_mw, middleware) {
                tracked_names.retain(|name| !names.contains(name));
            }
        }
        registered.retain(|(_, tracked_names)| !tracked_names.is_empty());
    }

    /// Leave the container: deregister owned middleware, remove this
    /// owner's contribution, and delete container keys no remaining
    /// owner claims. Idempotent; runs automatically at owner teardown.
    pub fn leave(&self) {
        if self.inner.left.swap(true, Ordering::AcqRel) {
            return;
        }
        let registered = std::mem::take(&mut *self.inner.registered.lock());
        for (middleware, names) in registered {
            self.inner.payload.off(&names, &middleware);
        }
        self.inner.payload.remove_contribution(self.inner.contribution);
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            tracing::warn!(initial = ?other, "initial values must be an object; contributing nothing");
            Map::new()
        }
    }
}
