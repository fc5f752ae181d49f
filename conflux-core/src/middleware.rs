//! Onion-style middleware composition.
//!
//! A [`Middleware`] receives a context and a [`Next`]; calling
//! `next.run(ctx)` resumes the rest of the chain and resolves once
//! everything downstream has finished, so a middleware can run code both
//! before and after the work it wraps. Skipping the `next` call
//! short-circuits the chain. Calling it twice is a programming error and
//! yields [`ComposeError::NextCalledTwice`] — the downstream chain has
//! already unwound and must not be re-entered.
//!
//! Uses boxed futures for dyn-compatibility (heterogeneous middleware
//! collections).

use crate::error::{ActionError, ComposeError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future alias used by all middleware signatures.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unit of behavior in a composed chain.
///
/// Middleware are referentially distinct: two behaviorally identical
/// middleware registered separately are separate entries, and
/// deregistration matches by [`Arc`] pointer identity.
pub trait Middleware<C>: Send + Sync {
    /// Process the context, optionally delegating to the rest of the chain.
    fn handle<'a>(
        &'a self,
        ctx: &'a C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), ActionError>>;
}

/// The remaining middleware chain.
///
/// `run` may be called at most once per invocation; a second call returns
/// [`ComposeError::NextCalledTwice`] instead of re-entering the chain.
pub struct Next<'a, C> {
    rest: &'a [Arc<dyn Middleware<C>>],
    index: usize,
    done: bool,
}

impl<'a, C: Sync> Next<'a, C> {
    fn new(rest: &'a [Arc<dyn Middleware<C>>], index: usize) -> Self {
        Self {
            rest,
            index,
            done: false,
        }
    }

    /// Continue the chain. Resolves after every downstream middleware
    /// (and its post-`next` code) has completed.
    pub async fn run(&mut self, ctx: &'a C) -> Result<(), ActionError> {
        if self.done {
            return Err(ComposeError::NextCalledTwice { index: self.index }.into());
        }
        self.done = true;
        match self.rest.split_first() {
            Some((head, tail)) => {
                let next = Next::new(tail, self.index + 1);
                head.handle(ctx, next).await
            }
            None => Ok(()),
        }
    }
}

/// A composed, reusable middleware pipeline.
///
/// Running an empty chain is a no-op that resolves immediately. The chain
/// may be run any number of times; each run gets fresh continuations.
pub struct Chain<C> {
    list: Vec<Arc<dyn Middleware<C>>>,
}

impl<C: Sync> Chain<C> {
    /// Execute the chain against `ctx`, in list order, onion style.
    pub fn run<'a>(&'a self, ctx: &'a C) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            let mut next = Next::new(&self.list, 0);
            next.run(ctx).await
        })
    }
}

impl<C> Chain<C> {
    /// Number of middleware in the chain.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Returns `true` if the chain holds no middleware.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

/// Compose an ordered list of middleware into a reusable [`Chain`].
pub fn compose<C>(middleware: Vec<Arc<dyn Middleware<C>>>) -> Chain<C> {
    Chain { list: middleware }
}

/// Wrapper that implements [`Middleware`] for a closure returning a boxed
/// future.
struct MiddlewareFn<F> {
    f: F,
}

impl<C, F> Middleware<C> for MiddlewareFn<F>
where
    C: Sync,
    F: for<'a> Fn(&'a C, Next<'a, C>) -> BoxFuture<'a, Result<(), ActionError>> + Send + Sync,
{
    fn handle<'a>(
        &'a self,
        ctx: &'a C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, Result<(), ActionError>> {
        (self.f)(ctx, next)
    }
}

/// Create middleware from a closure.
///
/// The closure must return a `Box::pin(async move { ... })` future. Keep
/// the returned `Arc` around if you intend to deregister later — identity
/// is pointer identity.
///
/// # Example
///
/// ```ignore
/// use conflux_core::*;
///
/// let logging = middleware_fn(|ctx: &MyCtx, mut next| {
///     Box::pin(async move {
///         println!("before");
///         let result = next.run(ctx).await;
///         println!("after");
///         result
///     })
/// });
/// ```
#[must_use]
pub fn middleware_fn<C, F>(f: F) -> Arc<dyn Middleware<C>>
where
    C: Sync + 'static,
    F: for<'a> Fn(&'a C, Next<'a, C>) -> BoxFuture<'a, Result<(), ActionError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(MiddlewareFn { f })
}
