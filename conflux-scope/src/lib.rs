//! # conflux-scope — ownership scopes for conflux
//!
//! Two small collaborators the containers lean on:
//!
//! - [`Owner`] — an explicit teardown handle. Joining a shared container
//!   registers its cleanup here; `dispose` (or dropping the last handle)
//!   releases everything exactly once, in reverse registration order.
//! - [`Context`] — an ambient publish/lookup tree. A container published
//!   at one node is discoverable from every descendant node, letting
//!   components inherit shared state from their ancestors without a
//!   global registry.

#![deny(missing_docs)]

pub mod context;
pub mod owner;

pub use context::Context;
pub use owner::Owner;
