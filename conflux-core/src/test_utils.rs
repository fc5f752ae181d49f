//! Shared test middleware. Enabled with the `test-utils` feature.

use crate::error::ActionError;
use crate::middleware::{BoxFuture, Middleware, Next};
use std::sync::{Arc, Mutex};

/// Middleware that records `"<label>:pre"` before delegating and
/// `"<label>:post"` after the rest of the chain returns. Useful for
/// asserting onion ordering.
pub struct RecordingMiddleware {
    label: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingMiddleware {
    /// Create a recorder writing into the shared `log`.
    pub fn new(label: impl Into<String>, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            label: label.into(),
            log,
        }
    }
}

impl<C: Sync> Middleware<C> for RecordingMiddleware {
    fn handle<'a>(
        &'a self,
        ctx: &'a C,
        mut next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(format!("{}:pre", self.label));
            let result = next.run(ctx).await;
            self.log.lock().unwrap().push(format!("{}:post", self.label));
            result
        })
    }
}

/// Middleware that rejects with a fixed message without delegating.
pub struct FailingMiddleware {
    message: String,
}

impl FailingMiddleware {
    /// Create a middleware that always fails with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl<C: Sync> Middleware<C> for FailingMiddleware {
    fn handle<'a>(
        &'a self,
        _ctx: &'a C,
        _next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move { Err(ActionError::failed(self.message.clone())) })
    }
}
