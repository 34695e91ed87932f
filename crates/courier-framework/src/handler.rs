//! Handler system for the Courier framework.
//!
//! A [`Handler`] is the terminal unit of work selected by the router. It
//! receives the dispatch [`Context`] and the [`Update`] by reference and
//! reports success or failure. Handlers never decide about propagation: the
//! router stops at the first registration whose filter accepts.
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_framework::{Handler, handler_fn};
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl Handler for Greeter {
//!     async fn handle(&self, _ctx: &Context, update: &Update) -> Result<(), BoxError> {
//!         tracing::info!(update_id = update.update_id, "hello");
//!         Ok(())
//!     }
//! }
//!
//! // or from a closure
//! let ping = handler_fn(|_ctx, _update| Box::pin(async move { Ok(()) }));
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use courier_core::{BoxError, Context, Update};

/// The terminal endpoint of a dispatch.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Processes one update.
    async fn handle(&self, ctx: &Context, update: &Update) -> Result<(), BoxError>;
}

/// A type-erased, shareable handler.
///
/// Registrations store handlers in this form after the middleware chain has
/// been applied.
pub type BoxedHandler = Arc<dyn Handler>;

#[async_trait]
impl<H> Handler for Arc<H>
where
    H: Handler + ?Sized,
{
    async fn handle(&self, ctx: &Context, update: &Update) -> Result<(), BoxError> {
        (**self).handle(ctx, update).await
    }
}

/// A [`Handler`] built from an async closure. See [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Creates a handler from a closure returning a boxed future.
///
/// ```rust,ignore
/// let handler = handler_fn(|ctx, update| Box::pin(async move {
///     if ctx.is_cancelled() {
///         return Ok(());
///     }
///     reply(update).await
/// }));
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a Context, &'a Update) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync
        + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a Context, &'a Update) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync
        + 'static,
{
    async fn handle(&self, ctx: &Context, update: &Update) -> Result<(), BoxError> {
        (self.f)(ctx, update).await
    }
}
