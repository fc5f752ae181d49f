//! # conflux-payload — shared state with named-action dispatch
//!
//! A [`Payload`] is a mutable JSON-map container shared by any number of
//! owners. Owners [`join`](Payload::join) it (creating one or inheriting
//! one published by an ancestor [`Context`](conflux_scope::Context)
//! scope), contribute initial values, and register middleware against
//! action names. Dispatching with [`act`](Payload::act) merges patches
//! into the container and runs the middleware subscribed to the
//! dispatched names as one onion-composed chain, tracking the names as
//! in-flight for [`is_acting`](Payload::is_acting) and the
//! [`loading`](Payload::loading) signal.
//!
//! Teardown is precise: a departing owner's middleware are deregistered
//! and only the container keys no remaining owner claims are deleted.
//! [`reset`](Payload::reset) restores keys to the *recomputed* merge of
//! the current owners' contributions — deliberately not a frozen
//! snapshot, so the initial state tracks owners joining and leaving.

#![deny(missing_docs)]

pub mod membership;
pub mod payload;
pub mod registry;

pub use membership::{JoinMode, JoinOptions, Membership};
pub use payload::{ACTION_FIELD, ActionInput, PAYLOAD_KEY, Payload};
pub use registry::ActionRegistry;
