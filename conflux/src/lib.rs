#![deny(missing_docs)]
//! # conflux — umbrella crate
//!
//! Provides a single import surface for the conflux workspace.
//! Re-exports the member crates behind feature flags, plus a
//! [`prelude`] for the happy path.
//!
//! ```
//! use conflux::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let ctx = Context::root();
//! let owner = Owner::new();
//!
//! let membership = Payload::join(
//!     &owner,
//!     &ctx,
//!     json!({"count": 0}),
//!     JoinOptions::create(),
//! )
//! .unwrap();
//!
//! let payload = membership.payload().clone();
//! payload
//!     .act([ActionInput::patch(json!({"count": 1}))])
//!     .await
//!     .unwrap();
//! assert_eq!(payload.get("count"), Some(json!(1)));
//! # }
//! ```

pub use conflux_core;
pub use conflux_scope;

#[cfg(feature = "payload")]
pub use conflux_payload;

#[cfg(feature = "verify")]
pub use conflux_verify;

/// Happy-path imports for composing conflux containers.
pub mod prelude {
    pub use conflux_core::{
        ActionError, ActionName, Chain, ComposeError, Middleware, Next, ScopeError, VerifyError,
        compose, middleware_fn,
    };
    pub use conflux_scope::{Context, Owner};

    #[cfg(feature = "payload")]
    pub use conflux_payload::{ActionInput, JoinMode, JoinOptions, Membership, Payload};

    #[cfg(feature = "verify")]
    pub use conflux_verify::{FieldContext, FieldSource, Validator, Verify};
}
