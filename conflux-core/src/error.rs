//! Error types for each component.

use thiserror::Error;

/// Composition faults — programming errors in a middleware chain.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ComposeError {
    /// A middleware invoked its continuation after it had already run.
    /// The chain past this point has unwound; re-entering it is a bug
    /// in the middleware, not a recoverable condition.
    #[error("next() called more than once (chain re-entry at index {index})")]
    NextCalledTwice {
        /// Chain position the second call would have re-entered.
        index: usize,
    },
}

/// Ambient-context errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ScopeError {
    /// An inherit-mode join (or any required lookup) found nothing
    /// published under the key. Fatal to the joining owner.
    #[error("no provider published under key: {key}")]
    MissingProvider {
        /// The lookup key that had no published value.
        key: String,
    },
}

/// Errors surfaced by a dispatch — from the composer or from the
/// middleware themselves.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ActionError {
    /// The chain was composed or driven incorrectly.
    #[error("compose error: {0}")]
    Compose(#[from] ComposeError),

    /// A middleware rejected with a message. This is the variant
    /// validators use; the message becomes the field's error text.
    #[error("{0}")]
    Failed(String),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ActionError {
    /// Shorthand for a middleware-authored rejection.
    pub fn failed(message: impl Into<String>) -> Self {
        ActionError::Failed(message.into())
    }
}

/// Aggregate validation failure.
///
/// Raised once per `validate` call after every requested field has run;
/// per-field messages live in the validation state and are read back
/// with `verify(field)`.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum VerifyError {
    /// One or more fields recorded a non-empty error.
    #[error("validation failed: {}", fields.join(", "))]
    Invalid {
        /// Names of the fields that failed, in validation order.
        fields: Vec<String>,
    },
}
