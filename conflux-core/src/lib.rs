//! # conflux-core — protocol types for conflux
//!
//! This crate defines the vocabulary the rest of the workspace composes:
//!
//! | Piece | Types | What it does |
//! |-------|-------|--------------|
//! | Actions | [`ActionName`] | Opaque tokens naming categories of state change |
//! | Composer | [`Middleware`], [`Next`], [`Chain`], [`compose`] | Onion-style async middleware chaining |
//! | Object utilities | [`merge`], [`pick`], [`MergeOptions`] | Deep merge with delete/depth modes, key extraction |
//! | Errors | [`ComposeError`], [`ScopeError`], [`ActionError`], [`VerifyError`] | One enum per failure surface |
//!
//! ## Dependency Notes
//!
//! State, patches, and initial values throughout the workspace are
//! `serde_json::Value` maps. JSON is the interchange format the
//! containers speak, and `serde_json::Value` is the de facto standard in
//! the Rust ecosystem; a generic `T: Serialize` would complicate trait
//! object safety without practical benefit.
//!
//! Middleware use boxed futures directly rather than `async-trait`: the
//! chains are heterogeneous trait-object collections, and the boxed
//! signature keeps the continuation (`Next`) a plain value.

#![deny(missing_docs)]

pub mod action;
pub mod error;
pub mod merge;
pub mod middleware;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-exports for convenience
pub use action::ActionName;
pub use error::{ActionError, ComposeError, ScopeError, VerifyError};
pub use merge::{MergeOptions, merge, merge_value, pick, pick_out};
pub use middleware::{BoxFuture, Chain, Middleware, Next, compose, middleware_fn};
