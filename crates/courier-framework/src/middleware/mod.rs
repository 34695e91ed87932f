//! Middleware and chains.
//!
//! A [`Middleware`] turns a handler into another handler. A [`Chain`] is an
//! ordered, immutable list of middleware that is applied to a terminal handler
//! with [`Chain::then`]:
//!
//! ```text
//! Chain [m1, m2, m3].then(h)  ==  m1(m2(m3(h)))
//!
//! m1 before ─▶ m2 before ─▶ m3 before ─▶ h
//! m1 after  ◀─ m2 after  ◀─ m3 after  ◀─┘
//! ```
//!
//! Chains have value semantics: [`Chain::append`] returns a new chain and
//! leaves the receiver untouched, so a base chain can be extended differently
//! for several groups of handlers without one group leaking into another.
//!
//! # Tower Integration
//!
//! `Chain` implements [`tower_layer::Layer`] for every [`Handler`], so it can be
//! used wherever a layer is expected:
//!
//! ```rust,ignore
//! use tower_layer::Layer;
//!
//! let wrapped: BoxedHandler = chain.layer(my_handler);
//! ```

mod logging;
mod recover;
mod timeout;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tower_layer::Layer;

use courier_core::{BoxError, Context, Update};

use crate::handler::{BoxedHandler, Handler};

pub use logging::{Logging, logging};
pub use recover::{Recover, recover};
pub use timeout::{Timeout, timeout};

/// A decorator from handler to handler.
///
/// Implementations decide whether and when the wrapped handler runs: they can
/// inspect or extend the context, short-circuit, post-process the result or
/// recover from a panic.
///
/// Any `Fn(BoxedHandler) -> BoxedHandler` closure is a middleware.
pub trait Middleware: Send + Sync + 'static {
    /// Wraps `next`, returning the decorated handler.
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

impl<F> Middleware for F
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        self(next)
    }
}

// ============================================================================
// Chain
// ============================================================================

/// An ordered, immutable sequence of middleware.
#[derive(Clone, Default)]
pub struct Chain {
    middlewares: Arc<[Arc<dyn Middleware>]>,
}

impl Chain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new chain with `middleware` added after the existing ones.
    ///
    /// The receiver is not modified.
    pub fn append<M: Middleware>(&self, middleware: M) -> Self {
        let middleware: Arc<dyn Middleware> = Arc::new(middleware);
        self.middlewares
            .iter()
            .cloned()
            .chain(std::iter::once(middleware))
            .collect()
    }

    /// Returns a new chain running `self` first, then `other`.
    pub fn extend(&self, other: &Chain) -> Self {
        self.middlewares
            .iter()
            .chain(other.middlewares.iter())
            .cloned()
            .collect()
    }

    /// Number of middleware in this chain.
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns `true` if the chain has no middleware.
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Applies the chain to a terminal handler.
    ///
    /// The first middleware of the chain ends up outermost.
    pub fn then<H: Handler>(&self, handler: H) -> BoxedHandler {
        self.middlewares
            .iter()
            .rev()
            .fold(Arc::new(handler) as BoxedHandler, |next, mw| mw.wrap(next))
    }
}

impl FromIterator<Arc<dyn Middleware>> for Chain {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Middleware>>>(iter: I) -> Self {
        Self {
            middlewares: iter.into_iter().collect(),
        }
    }
}

impl<H: Handler> Layer<H> for Chain {
    type Service = BoxedHandler;

    fn layer(&self, inner: H) -> Self::Service {
        self.then(inner)
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("len", &self.middlewares.len())
            .finish()
    }
}

// ============================================================================
// from_fn
// ============================================================================

/// The rest of the chain, handed to [`from_fn`] middleware.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    inner: &'a dyn Handler,
}

impl Next<'_> {
    /// Runs the remaining middleware and the terminal handler.
    pub async fn run(self, ctx: &Context, update: &Update) -> Result<(), BoxError> {
        self.inner.handle(ctx, update).await
    }
}

/// Middleware built from an async closure. See [`from_fn`].
pub struct FromFn<F> {
    f: Arc<F>,
}

/// Creates middleware from a closure receiving the context, the update and
/// the rest of the chain.
///
/// ```rust,ignore
/// let admin_only = middleware::from_fn(|ctx, update, next| Box::pin(async move {
///     if !is_admin(update) {
///         return Ok(()); // short-circuit
///     }
///     next.run(ctx, update).await
/// }));
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: for<'a> Fn(&'a Context, &'a Update, Next<'a>) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync
        + 'static,
{
    FromFn { f: Arc::new(f) }
}

impl<F> Middleware for FromFn<F>
where
    F: for<'a> Fn(&'a Context, &'a Update, Next<'a>) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync
        + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(FromFnHandler {
            f: Arc::clone(&self.f),
            next,
        })
    }
}

struct FromFnHandler<F> {
    f: Arc<F>,
    next: BoxedHandler,
}

#[async_trait]
impl<F> Handler for FromFnHandler<F>
where
    F: for<'a> Fn(&'a Context, &'a Update, Next<'a>) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync
        + 'static,
{
    async fn handle(&self, ctx: &Context, update: &Update) -> Result<(), BoxError> {
        let next = Next {
            inner: self.next.as_ref(),
        };
        (self.f)(ctx, update, next).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{new_log, recorder, tracer};
    use super::*;
    use courier_core::UpdateKind;
    use tokio_test::assert_ok;

    fn update() -> Update {
        Update::new(1, UpdateKind::Unknown)
    }

    #[tokio::test]
    async fn test_chain_runs_in_onion_order() {
        let log = new_log();
        let chain = Chain::new().append(tracer(&log, "A")).append(tracer(&log, "B"));

        let handler = chain.then(recorder(&log, "H"));
        assert_ok!(handler.handle(&Context::new(), &update()).await);

        assert_eq!(
            *log.lock(),
            ["A-before", "B-before", "H", "B-after", "A-after"]
        );
    }

    #[tokio::test]
    async fn test_append_does_not_mutate_base() {
        let log = new_log();
        let base = Chain::new().append(tracer(&log, "A"));
        let extended = base.append(tracer(&log, "B"));
        assert_eq!((base.len(), extended.len()), (1, 2));

        assert_ok!(
            base.then(recorder(&log, "H"))
                .handle(&Context::new(), &update())
                .await
        );
        assert_eq!(*log.lock(), ["A-before", "H", "A-after"]);
    }

    #[tokio::test]
    async fn test_short_circuit() {
        let log = new_log();
        let gate = from_fn(|_ctx, _update, _next| Box::pin(async move { Ok(()) }));
        let handler = Chain::new().append(gate).then(recorder(&log, "H"));

        assert_ok!(handler.handle(&Context::new(), &update()).await);
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_middleware_extends_context_for_inner() {
        struct Locale(&'static str);

        let inject = from_fn(|ctx, update, next| {
            Box::pin(async move {
                ctx.insert(Locale("de"));
                next.run(ctx, update).await
            })
        });
        let check = crate::handler::handler_fn(|ctx, _update| {
            Box::pin(async move {
                match ctx.get::<Locale>() {
                    Some(locale) if locale.0 == "de" => Ok(()),
                    _ => Err("locale missing".into()),
                }
            })
        });

        let handler = Chain::new().append(inject).then(check);
        assert_ok!(handler.handle(&Context::new(), &update()).await);
    }

    #[tokio::test]
    async fn test_closure_middleware_and_layer() {
        let log = new_log();
        let chain = Chain::new()
            .append(|next: BoxedHandler| next)
            .extend(&Chain::new().append(tracer(&log, "T")));

        let handler = Layer::layer(&chain, recorder(&log, "H"));
        assert_ok!(handler.handle(&Context::new(), &update()).await);
        assert_eq!(*log.lock(), ["T-before", "H", "T-after"]);
    }
}
