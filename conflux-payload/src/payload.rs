//! The shared state container and its action dispatch runtime.

use crate::registry::ActionRegistry;
use conflux_core::{
    ActionError, ActionName, MergeOptions, Middleware, compose, merge, pick_out,
};
use conflux_scope::Context;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;

/// Default ambient-context key containers are published under.
pub const PAYLOAD_KEY: &str = "conflux.payload";

/// Patch field naming the action(s) a patch belongs to.
///
/// A patch object carrying `{"$action": "save"}` (or an array of names)
/// has the field picked out and folded into the dispatch's name list
/// before the remainder merges into the container.
pub const ACTION_FIELD: &str = "$action";

/// One argument to [`Payload::act`]: an action name or a state patch.
///
/// Patch values are interpreted the way the dispatch contract reads:
/// a JSON string is a name, a JSON array is a list of names, a JSON
/// object is a patch (possibly embedding [`ACTION_FIELD`]).
pub enum ActionInput {
    /// An explicit action name.
    Name(ActionName),
    /// A state patch (or name/name-array in JSON form).
    Patch(Value),
}

impl ActionInput {
    /// An explicit name input.
    pub fn name(name: impl Into<ActionName>) -> Self {
        ActionInput::Name(name.into())
    }

    /// A patch input.
    pub fn patch(value: Value) -> Self {
        ActionInput::Patch(value)
    }
}

impl From<ActionName> for ActionInput {
    fn from(name: ActionName) -> Self {
        ActionInput::Name(name)
    }
}

impl From<&str> for ActionInput {
    fn from(name: &str) -> Self {
        ActionInput::Name(name.into())
    }
}

impl From<String> for ActionInput {
    fn from(name: String) -> Self {
        ActionInput::Name(name.into())
    }
}

impl From<Value> for ActionInput {
    fn from(value: Value) -> Self {
        ActionInput::Patch(value)
    }
}

/// One owner's recorded initial values.
pub(crate) struct Contribution {
    pub(crate) id: u64,
    pub(crate) initial: Map<String, Value>,
}

/// A multi-owner shared mutable state container with a named-action
/// middleware dispatch runtime.
///
/// Cheap to clone; clones alias the same container. The public payload is
/// a JSON map; the control block (registry, in-flight names, ownership
/// contributions) is typed state that never appears in snapshots.
#[derive(Clone)]
pub struct Payload {
    inner: Arc<Inner>,
}

struct Inner {
    /// Public payload. Lock order: contributions → fields → concealed.
    fields: Mutex<Map<String, Value>>,
    /// Payload keys excluded from snapshots and default resets.
    concealed: Mutex<HashSet<String>>,
    registry: Mutex<ActionRegistry>,
    /// In-flight action names — an ordered multiset; concurrent
    /// dispatches of one name each contribute an occurrence.
    acting: Mutex<Vec<ActionName>>,
    contributions: Mutex<Vec<Contribution>>,
    loading_tx: watch::Sender<bool>,
}

/// Fold an empty name list to the distinguished default name.
pub(crate) fn fold_default(names: &[ActionName]) -> Vec<ActionName> {
    if names.is_empty() {
        vec![ActionName::Default]
    } else {
        names.to_vec()
    }
}

impl Payload {
    /// Create an empty container with no owners.
    ///
    /// Most callers go through [`Payload::join`] instead, which seeds
    /// initial values and wires teardown.
    pub fn new() -> Self {
        let (loading_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                fields: Mutex::new(Map::new()),
                concealed: Mutex::new(HashSet::new()),
                registry: Mutex::new(ActionRegistry::new()),
                acting: Mutex::new(Vec::new()),
                contributions: Mutex::new(Vec::new()),
                loading_tx,
            }),
        }
    }

    // --- state ---

    /// Current value of a payload key, concealed or not.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.fields.lock().get(key).cloned()
    }

    /// Set one payload key wholesale (no structural merge).
    pub fn set(&self, key: &str, value: Value) {
        self.inner.fields.lock().insert(key.to_string(), value);
    }

    /// Deep-merge an object patch into the payload. Non-object patches
    /// are ignored with a warning. Returns `&self` for chaining.
    pub fn assign(&self, patch: &Value) -> &Self {
        match patch {
            Value::Object(map) => {
                merge(&mut self.inner.fields.lock(), map, MergeOptions::deep());
            }
            other => tracing::warn!(patch = ?other, "assign expects an object patch"),
        }
        self
    }

    /// The visible payload: every field not marked concealed.
    pub fn snapshot(&self) -> Value {
        let fields = self.inner.fields.lock();
        let concealed = self.inner.concealed.lock();
        Value::Object(
            fields
                .iter()
                .filter(|(key, _)| !concealed.contains(*key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }

    /// Mark payload keys internal: excluded from [`snapshot`](Self::snapshot)
    /// and from no-argument [`reset`](Self::reset).
    pub fn conceal(&self, keys: &[&str]) {
        let mut concealed = self.inner.concealed.lock();
        for key in keys {
            concealed.insert((*key).to_string());
        }
    }

    /// Revert keys marked with [`conceal`](Self::conceal) to visible.
    pub fn reveal(&self, keys: &[&str]) {
        let mut concealed = self.inner.concealed.lock();
        for key in keys {
            concealed.remove(*key);
        }
    }

    /// The recomputed initial state: the deep merge of every current
    /// owner's contributed initial values, in join order.
    ///
    /// This is recomputed live, not a frozen snapshot — the result
    /// changes as owners join and leave while the container is shared.
    pub fn initial(&self) -> Map<String, Value> {
        let contributions = self.inner.contributions.lock();
        let mut initial = Map::new();
        for contribution in contributions.iter() {
            merge(&mut initial, &contribution.initial, MergeOptions::deep());
        }
        initial
    }

    /// Restore payload keys to the recomputed initial state.
    ///
    /// With no keys, every non-concealed key is restored and runtime-added
    /// keys are deleted. With keys, each named key is restored on its own:
    /// object values merge recursively with deletion semantics, scalars
    /// are replaced, and keys absent from the recomputed initial are
    /// removed.
    pub fn reset(&self, keys: &[&str]) {
        let initial = self.initial();
        let mut fields = self.inner.fields.lock();
        if keys.is_empty() {
            let concealed = self.inner.concealed.lock();
            let visible: Vec<String> = fields
                .keys()
                .filter(|key| !concealed.contains(*key))
                .cloned()
                .collect();
            for key in visible {
                if !initial.contains_key(&key) {
                    fields.remove(&key);
                }
            }
            for (key, value) in &initial {
                if !concealed.contains(key) {
                    restore_key(&mut fields, key, value);
                }
            }
        } else {
            for key in keys {
                match initial.get(*key) {
                    Some(value) => restore_key(&mut fields, key, value),
                    None => {
                        fields.remove(*key);
                    }
                }
            }
        }
    }

    // --- registry ---

    /// Register `middleware` under each of `names` (the default name if
    /// none given). Keep the `Arc` to deregister later — identity is
    /// pointer identity.
    pub fn on(&self, names: &[ActionName], middleware: Arc<dyn Middleware<Payload>>) {
        let names = fold_default(names);
        self.inner.registry.lock().register(&names, middleware);
    }

    /// Remove the association between `middleware` and each of `names`
    /// (the default name if none given). A middleware with no remaining
    /// names leaves the registry entirely.
    pub fn off(&self, names: &[ActionName], middleware: &Arc<dyn Middleware<Payload>>) {
        let names = fold_default(names);
        self.inner.registry.lock().deregister(&names, middleware);
    }

    /// Number of middleware currently registered.
    pub fn middleware_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    // --- dispatch ---

    /// Dispatch actions and/or state patches.
    ///
    /// Inputs partition into action names and patches; a patch embedding
    /// [`ACTION_FIELD`] contributes those names too. Every patch merges
    /// into the container whether or not any names were given. The
    /// middleware matching the names (the default name, if none) then run
    /// as one composed chain with this container as context, and the
    /// names count as in-flight until the chain settles — on success and
    /// on failure alike.
    pub async fn act<I>(&self, inputs: I) -> Result<(), ActionError>
    where
        I: IntoIterator<Item = ActionInput>,
    {
        let mut names: Vec<ActionName> = Vec::new();
        let mut patches: Vec<Map<String, Value>> = Vec::new();

        for input in inputs {
            match input {
                ActionInput::Name(name) => names.push(name),
                ActionInput::Patch(Value::String(name)) => names.push(name.into()),
                ActionInput::Patch(Value::Array(items)) => {
                    collect_names(&Value::Array(items), &mut names);
                }
                ActionInput::Patch(Value::Object(mut map)) => {
                    let mut embedded = pick_out(&mut map, &[ACTION_FIELD]);
                    if let Some(value) = embedded.remove(ACTION_FIELD) {
                        collect_names(&value, &mut names);
                    }
                    patches.push(map);
                }
                ActionInput::Patch(other) => {
                    tracing::warn!(input = ?other, "ignoring non-object dispatch input");
                }
            }
        }

        {
            let mut fields = self.inner.fields.lock();
            for patch in &patches {
                merge(&mut fields, patch, MergeOptions::deep());
            }
        }

        let names = fold_default(&names);
        let chain = compose(self.inner.registry.lock().matching(&names));
        tracing::debug!(names = ?names, middleware = chain.len(), "dispatch start");

        {
            let mut acting = self.inner.acting.lock();
            acting.extend(names.iter().cloned());
        }
        self.refresh_loading();

        let result = chain.run(self).await;

        {
            let mut acting = self.inner.acting.lock();
            for name in &names {
                if let Some(pos) = acting.iter().position(|entry| entry == name) {
                    acting.remove(pos);
                }
            }
        }
        self.refresh_loading();

        match &result {
            Ok(()) => tracing::debug!(names = ?names, "dispatch complete"),
            Err(error) => tracing::debug!(names = ?names, %error, "dispatch failed"),
        }
        result
    }

    /// Whether any of `names` is currently in flight; with no names,
    /// whether anything at all is.
    pub fn is_acting(&self, names: &[ActionName]) -> bool {
        let acting = self.inner.acting.lock();
        if names.is_empty() {
            !acting.is_empty()
        } else {
            names.iter().any(|name| acting.contains(name))
        }
    }

    /// `true` iff the in-flight set is non-empty.
    pub fn loading(&self) -> bool {
        *self.inner.loading_tx.borrow()
    }

    /// A watch receiver over the loading state. Updates synchronously
    /// with in-flight transitions.
    pub fn loading_watch(&self) -> watch::Receiver<bool> {
        self.inner.loading_tx.subscribe()
    }

    fn refresh_loading(&self) {
        let loading = !self.inner.acting.lock().is_empty();
        self.inner.loading_tx.send_if_modified(|current| {
            if *current == loading {
                false
            } else {
                *current = loading;
                true
            }
        });
    }

    // --- sharing ---

    /// Publish this container into the ambient context under `key`,
    /// making it discoverable to descendant scopes.
    pub fn publish(&self, ctx: &Context, key: &str) {
        ctx.publish(key, self.clone());
    }

    // --- ownership bookkeeping ---

    pub(crate) fn add_contribution(&self, initial: Map<String, Value>) -> u64 {
        let id = crate::membership::next_contribution_id();
        {
            let mut contributions = self.inner.contributions.lock();
            merge(&mut self.inner.fields.lock(), &initial, MergeOptions::deep());
            contributions.push(Contribution { id, initial });
        }
        tracing::debug!(contribution = id, "contribution joined");
        id
    }

    pub(crate) fn remove_contribution(&self, id: u64) {
        let mut contributions = self.inner.contributions.lock();
        let Some(pos) = contributions.iter().position(|c| c.id == id) else {
            return;
        };
        let departing = contributions.remove(pos);

        let mut dropped = Vec::new();
        {
            let mut fields = self.inner.fields.lock();
            let mut concealed = self.inner.concealed.lock();
            for key in departing.initial.keys() {
                let still_claimed = contributions
                    .iter()
                    .any(|c| c.initial.contains_key(key));
                if !still_claimed && fields.remove(key).is_some() {
                    concealed.remove(key);
                    dropped.push(key.clone());
                }
            }
        }

        if dropped.is_empty() {
            tracing::debug!(contribution = id, "contribution left");
        } else {
            tracing::debug!(contribution = id, keys = ?dropped, "contribution left, unique keys dropped");
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::new()
    }
}

/// Restore one key from the recomputed initial: objects merge with
/// deletion semantics, anything else is replaced.
fn restore_key(fields: &mut Map<String, Value>, key: &str, initial_value: &Value) {
    match (fields.get_mut(key), initial_value) {
        (Some(Value::Object(existing)), Value::Object(nested)) => {
            merge(existing, nested, MergeOptions::deleting());
        }
        _ => {
            fields.insert(key.to_string(), initial_value.clone());
        }
    }
}

/// Fold a `"name"` or `["name", ...]` JSON value into the name list.
fn collect_names(value: &Value, names: &mut Vec<ActionName>) {
    match value {
        Value::String(name) => names.push(name.as_str().into()),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(name) => names.push(name.as_str().into()),
                    other => {
                        tracing::warn!(entry = ?other, "ignoring non-string action name entry");
                    }
                }
            }
        }
        other => tracing::warn!(value = ?other, "ignoring malformed action name value"),
    }
}
