//! # conflux-verify — per-field validation pipelines
//!
//! A [`Verify`] wraps one target object (anything implementing
//! [`FieldSource`]) and maintains per-field validation state. Validators
//! are ordinary middleware over a [`FieldContext`]; each field has its
//! own bucket, plus a wildcard bucket that runs for every validated
//! field. A rejection from a field's composed chain is caught and
//! recorded as that field's error message — it becomes state, not an
//! exception — and once every requested field has run, a single
//! aggregate [`VerifyError`] reports which fields failed.

#![deny(missing_docs)]

use conflux_core::{Middleware, VerifyError, compose};
use conflux_payload::Payload;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Read access to the fields of a validation target.
///
/// The pipeline reads the target lazily, at validation time — the same
/// `Verify` keeps working as the underlying object changes.
pub trait FieldSource: Send + Sync {
    /// Current value of the named field, if present.
    fn field(&self, name: &str) -> Option<Value>;
}

impl FieldSource for Value {
    fn field(&self, name: &str) -> Option<Value> {
        self.as_object().and_then(|map| map.get(name)).cloned()
    }
}

impl FieldSource for Payload {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name)
    }
}

/// The context a validator chain runs against: one field and its value
/// at validation time (JSON null when the field is absent).
#[derive(Debug, Clone)]
pub struct FieldContext {
    /// Name of the field under validation.
    pub field: String,
    /// The field's current value.
    pub value: Value,
}

/// A validator — middleware over a [`FieldContext`]. Reject (any
/// [`ActionError`](conflux_core::ActionError)) to fail the field; the
/// error's display string becomes the field's message.
pub type Validator = Arc<dyn Middleware<FieldContext>>;

#[derive(Clone, PartialEq, Eq, Hash)]
enum Bucket {
    /// Runs for every validated field, ahead of its own validators.
    Wildcard,
    Field(String),
}

/// A validation pipeline bound to one target object.
pub struct Verify<S> {
    source: S,
    /// field → error message; empty string = validated OK, absent =
    /// never validated.
    state: Mutex<BTreeMap<String, String>>,
    rules: Mutex<HashMap<Bucket, Vec<Validator>>>,
}

impl<S: FieldSource> Verify<S> {
    /// Create a pipeline over `source` with no validators and no state.
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: Mutex::new(BTreeMap::new()),
            rules: Mutex::new(HashMap::new()),
        }
    }

    /// The validation target.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Register a validator for each named field — or, with no fields,
    /// into the wildcard bucket applied to every validation run.
    pub fn on(&self, fields: &[&str], validator: Validator) {
        let mut rules = self.rules.lock();
        for bucket in buckets(fields) {
            let list = rules.entry(bucket).or_default();
            if !list.iter().any(|existing| Arc::ptr_eq(existing, &validator)) {
                list.push(Arc::clone(&validator));
            }
        }
    }

    /// Remove a validator from each named field (the wildcard bucket
    /// with no fields). A bucket left empty is dropped.
    pub fn off(&self, fields: &[&str], validator: &Validator) {
        let mut rules = self.rules.lock();
        for bucket in buckets(fields) {
            if let Some(list) = rules.get_mut(&bucket) {
                list.retain(|existing| !Arc::ptr_eq(existing, validator));
                if list.is_empty() {
                    rules.remove(&bucket);
                }
            }
        }
    }

    /// Drop validator registrations for the named fields — or, with no
    /// fields, for every known field plus the wildcard bucket. Validation
    /// state is untouched.
    pub fn clear(&self, fields: &[&str]) {
        let mut rules = self.rules.lock();
        if fields.is_empty() {
            let known: Vec<Bucket> = self
                .state
                .lock()
                .keys()
                .map(|field| Bucket::Field(field.clone()))
                .chain([Bucket::Wildcard])
                .collect();
            for bucket in known {
                rules.remove(&bucket);
            }
        } else {
            for field in fields {
                rules.remove(&Bucket::Field((*field).to_string()));
            }
        }
    }

    /// Reset the named fields' (or, with none given, all known fields')
    /// error state to never-validated.
    pub fn clear_validate(&self, fields: &[&str]) {
        let mut state = self.state.lock();
        if fields.is_empty() {
            state.clear();
        } else {
            for field in fields {
                state.remove(*field);
            }
        }
    }

    /// The field's current error message, initializing it to the empty
    /// string on first access — never absent after a read.
    pub fn verify(&self, field: &str) -> String {
        self.state.lock().entry(field.to_string()).or_default().clone()
    }

    /// Validate the named fields (every known field, with none given).
    ///
    /// Per field: clear its error, run the composed wildcard +
    /// field-specific chain against the field's current value, and record
    /// a rejection's message as the field's error instead of propagating
    /// it. After all requested fields have run, any recorded non-empty
    /// error fails the whole call with the failing field names.
    pub async fn validate(&self, fields: &[&str]) -> Result<(), VerifyError> {
        let fields: Vec<String> = if fields.is_empty() {
            self.state.lock().keys().cloned().collect()
        } else {
            fields.iter().map(|field| (*field).to_string()).collect()
        };

        for field in &fields {
            self.state.lock().remove(field);

            let chain = {
                let rules = self.rules.lock();
                let mut list: Vec<Validator> = Vec::new();
                if let Some(wildcard) = rules.get(&Bucket::Wildcard) {
                    list.extend(wildcard.iter().cloned());
                }
                if let Some(own) = rules.get(&Bucket::Field(field.clone())) {
                    list.extend(own.iter().cloned());
                }
                compose(list)
            };

            let ctx = FieldContext {
                field: field.clone(),
                value: self.source.field(field).unwrap_or(Value::Null),
            };

            if let Err(error) = chain.run(&ctx).await {
                let message = error.to_string();
                tracing::warn!(field = %field, error = %message, "field validation failed");
                self.state.lock().insert(field.clone(), message);
            }
        }

        let state = self.state.lock();
        let failing: Vec<String> = fields
            .iter()
            .filter(|field| state.get(*field).is_some_and(|message| !message.is_empty()))
            .cloned()
            .collect();
        if failing.is_empty() {
            Ok(())
        } else {
            Err(VerifyError::Invalid { fields: failing })
        }
    }
}

fn buckets(fields: &[&str]) -> Vec<Bucket> {
    if fields.is_empty() {
        vec![Bucket::Wildcard]
    } else {
        fields
            .iter()
            .map(|field| Bucket::Field((*field).to_string()))
            .collect()
    }
}
