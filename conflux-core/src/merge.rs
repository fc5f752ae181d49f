//! Deep merge and pick over `serde_json` values.
//!
//! These are the object utilities the containers are built on: `merge`
//! folds a source map into a target map with configurable recursion depth
//! and an optional deletion mode (keys absent from the source are removed
//! from the target), and `pick`/`pick_out` extract named keys.

use serde_json::{Map, Value};

/// Options controlling a [`merge`].
#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    /// How many levels of nested objects merge structurally below the
    /// top-level entries. At depth 0 every source key overwrites its
    /// target key wholesale.
    pub depth: usize,
    /// When set, keys present in the target but absent from the source
    /// are deleted (applied at every merged level).
    pub delete: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            depth: usize::MAX,
            delete: false,
        }
    }
}

impl MergeOptions {
    /// Unbounded structural merge, no deletion.
    pub fn deep() -> Self {
        Self::default()
    }

    /// Unbounded structural merge with deletion semantics.
    pub fn deleting() -> Self {
        Self {
            delete: true,
            ..Self::default()
        }
    }

    /// Structural merge limited to `depth` nested levels.
    pub fn with_depth(depth: usize) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }
}

/// Fold `source` into `target`.
///
/// Entries whose values are both objects merge recursively while depth
/// remains; every other entry is overwritten with a clone of the source
/// value. With [`MergeOptions::delete`], target keys missing from the
/// source are removed first, at each merged level.
pub fn merge(target: &mut Map<String, Value>, source: &Map<String, Value>, opts: MergeOptions) {
    if opts.delete {
        target.retain(|key, _| source.contains_key(key));
    }
    for (key, incoming) in source {
        match (target.get_mut(key), incoming) {
            (Some(Value::Object(existing)), Value::Object(nested)) if opts.depth > 0 => {
                merge(
                    existing,
                    nested,
                    MergeOptions {
                        depth: opts.depth - 1,
                        ..opts
                    },
                );
            }
            _ => {
                target.insert(key.clone(), incoming.clone());
            }
        }
    }
}

/// [`merge`] lifted to arbitrary values: object-into-object merges
/// structurally, any other pairing replaces the target wholesale.
pub fn merge_value(target: &mut Value, source: &Value, opts: MergeOptions) {
    match (target, source) {
        (Value::Object(existing), Value::Object(nested)) => merge(existing, nested, opts),
        (target, source) => *target = source.clone(),
    }
}

/// Extract the named keys into a new map. Keys absent from the source are
/// skipped, not defaulted.
pub fn pick(source: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    let mut out = Map::new();
    for key in keys {
        if let Some(value) = source.get(*key) {
            out.insert((*key).to_string(), value.clone());
        }
    }
    out
}

/// Extract the named keys into a new map, removing them from the source.
pub fn pick_out(source: &mut Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    let mut out = Map::new();
    for key in keys {
        if let Some(value) = source.remove(*key) {
            out.insert((*key).to_string(), value);
        }
    }
    out
}
