//! The first-match update router.
//!
//! A [`Router`] keeps, for every [`Kind`], an ordered list of
//! [`Registration`]s. Dispatching an update walks the list for the update's
//! kind and runs the first registration whose filter accepts:
//!
//! 1. Updates of unknown kind are ignored
//! 2. Registrations are tried in registration order
//! 3. A rejecting filter moves on to the next registration
//! 4. A failing filter aborts the dispatch
//! 5. The first accepted registration runs its handler and ends the dispatch
//!
//! ```rust,ignore
//! use courier_framework::{Router, filter, middleware};
//!
//! let router = Router::new()
//!     .use_middleware(middleware::logging())
//!     .message(start, filter::command(["start"]))
//!     .message(echo, ())
//!     .callback_query(vote, filter::callback_data_prefix("vote:"));
//!
//! router.dispatch(&ctx, &update).await?;
//! ```
//!
//! # Middleware Snapshots
//!
//! The chain configured with [`Router::use_middleware`] is applied to a handler
//! when it is registered. Middleware added later only wraps handlers registered
//! after it.
//!
//! # Sharing
//!
//! Cloning a router is cheap. The builder methods are copy-on-write: if the
//! router is shared (for example with a running [`Runtime`]), the registration
//! table is copied before it is modified, so a router that is already
//! dispatching never changes underneath its users.
//!
//! [`Runtime`]: https://docs.rs/courier-runtime

use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tower::Service;
use tracing::{debug, trace};

use courier_core::{BoxError, Context, Kind, Update};

use crate::error::DispatchError;
use crate::filter::{BoxedFilter, IntoFilters, compact_filter};
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{Chain, Middleware};

/// One entry of the registration table.
#[derive(Clone)]
pub struct Registration {
    /// The handler with the chain captured at registration already applied.
    handler: BoxedHandler,
    /// `None` means the registration accepts every update of its kind.
    filter: Option<BoxedFilter>,
}

impl Registration {
    /// Returns the wrapped handler.
    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    /// Returns the filter, if any.
    pub fn filter(&self) -> Option<&BoxedFilter> {
        self.filter.as_ref()
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("filter", &self.filter.as_ref().map(|f| f.name()))
            .finish_non_exhaustive()
    }
}

/// Why an update was not handled by any registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unhandled {
    /// The update carried no routable payload.
    Unroutable,
    /// Nothing is registered for the update's kind.
    NoRegistrations(Kind),
    /// Every registration for the kind rejected the update.
    NoMatch(Kind),
}

/// The outcome of a successful [`Router::route`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// The registration at `index` in the list for `kind` handled the update.
    Handled { kind: Kind, index: usize },
    /// No registration handled the update and the fallback handler ran.
    Fallback(Unhandled),
    /// No registration handled the update and no fallback is set.
    Ignored(Unhandled),
}

impl Routed {
    /// Returns `true` if a registration handled the update.
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled { .. })
    }

    /// Returns why no registration handled the update, if so.
    pub fn unhandled(&self) -> Option<Unhandled> {
        match *self {
            Self::Handled { .. } => None,
            Self::Fallback(reason) | Self::Ignored(reason) => Some(reason),
        }
    }
}

/// Implements `Clone` to support `Arc::make_mut` for copy-on-write semantics.
#[derive(Clone)]
struct RouterInner {
    chain: Chain,
    routes: [Vec<Registration>; Kind::COUNT],
    fallback: Option<BoxedHandler>,
}

impl Default for RouterInner {
    fn default() -> Self {
        Self {
            chain: Chain::new(),
            routes: std::array::from_fn(|_| Vec::new()),
            fallback: None,
        }
    }
}

/// Routes each update to the first matching handler registered for its kind.
#[derive(Clone, Default)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    /// Creates a router with no registrations and an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner_mut(&mut self) -> &mut RouterInner {
        Arc::make_mut(&mut self.inner)
    }

    /// Appends `middleware` to the chain applied to handlers registered from
    /// now on.
    pub fn use_middleware<M: Middleware>(mut self, middleware: M) -> Self {
        let inner = self.inner_mut();
        inner.chain = inner.chain.append(middleware);
        self
    }

    /// Appends every middleware of `chain`, in order.
    pub fn use_chain(mut self, chain: &Chain) -> Self {
        let inner = self.inner_mut();
        inner.chain = inner.chain.extend(chain);
        self
    }

    /// Returns the chain that the next registration will capture.
    pub fn chain(&self) -> &Chain {
        &self.inner.chain
    }

    /// Registers `handler` for updates of `kind`, guarded by `filters`.
    ///
    /// The current chain is applied immediately. Several filters are combined
    /// with [`all`](crate::filter::all).
    pub fn on<H: Handler>(mut self, kind: Kind, handler: H, filters: impl IntoFilters) -> Self {
        let inner = self.inner_mut();
        let registration = Registration {
            handler: inner.chain.then(handler),
            filter: compact_filter(filters.into_filters()),
        };
        inner.routes[kind.index()].push(registration);
        self
    }

    /// Sets the handler run for updates no registration handles.
    ///
    /// The current chain is applied immediately. Setting it again replaces the
    /// previous fallback.
    pub fn fallback<H: Handler>(mut self, handler: H) -> Self {
        let inner = self.inner_mut();
        inner.fallback = Some(inner.chain.then(handler));
        self
    }

    /// Returns the registrations for `kind`, in dispatch order.
    pub fn registrations(&self, kind: Kind) -> &[Registration] {
        &self.inner.routes[kind.index()]
    }

    /// Returns the total number of registrations.
    pub fn len(&self) -> usize {
        self.inner.routes.iter().map(Vec::len).sum()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a fallback handler is set.
    pub fn has_fallback(&self) -> bool {
        self.inner.fallback.is_some()
    }

    /// Routes `update` and reports how it was handled.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Filter`] if a filter fails, and
    /// [`DispatchError::Handler`] if the selected handler (or the fallback)
    /// fails.
    pub async fn route(&self, ctx: &Context, update: &Update) -> Result<Routed, DispatchError> {
        let Some(kind) = update.kind() else {
            return self.unhandled(ctx, update, Unhandled::Unroutable).await;
        };

        let registrations = self.registrations(kind);
        if registrations.is_empty() {
            return self
                .unhandled(ctx, update, Unhandled::NoRegistrations(kind))
                .await;
        }

        for (index, registration) in registrations.iter().enumerate() {
            if let Some(filter) = &registration.filter {
                let matched =
                    filter
                        .allow(ctx, update)
                        .await
                        .map_err(|source| DispatchError::Filter {
                            filter: filter.name(),
                            source,
                        })?;
                if !matched {
                    trace!(update_id = update.update_id, %kind, index, "Registration rejected update");
                    continue;
                }
            }

            debug!(update_id = update.update_id, %kind, index, "Registration matched");
            registration
                .handler
                .handle(ctx, update)
                .await
                .map_err(DispatchError::Handler)?;
            return Ok(Routed::Handled { kind, index });
        }

        self.unhandled(ctx, update, Unhandled::NoMatch(kind)).await
    }

    async fn unhandled(
        &self,
        ctx: &Context,
        update: &Update,
        reason: Unhandled,
    ) -> Result<Routed, DispatchError> {
        match &self.inner.fallback {
            Some(fallback) => {
                debug!(update_id = update.update_id, ?reason, "Running fallback handler");
                fallback
                    .handle(ctx, update)
                    .await
                    .map_err(DispatchError::Handler)?;
                Ok(Routed::Fallback(reason))
            }
            None => {
                trace!(update_id = update.update_id, ?reason, "Update not handled");
                Ok(Routed::Ignored(reason))
            }
        }
    }

    /// Dispatches `update` to the first matching registration.
    ///
    /// An update that no registration handles is not an error.
    pub async fn dispatch(&self, ctx: &Context, update: &Update) -> Result<(), DispatchError> {
        self.route(ctx, update).await.map(|_| ())
    }
}

macro_rules! kind_methods {
    ($( $method:ident => $kind:ident ),* $(,)?) => {
        impl Router {
            $(
                #[doc = concat!("Registers `handler` for [`Kind::", stringify!($kind), "`] updates.")]
                pub fn $method<H: Handler>(self, handler: H, filters: impl IntoFilters) -> Self {
                    self.on(Kind::$kind, handler, filters)
                }
            )*
        }
    };
}

kind_methods! {
    message => Message,
    edited_message => EditedMessage,
    channel_post => ChannelPost,
    edited_channel_post => EditedChannelPost,
    inline_query => InlineQuery,
    chosen_inline_result => ChosenInlineResult,
    callback_query => CallbackQuery,
    shipping_query => ShippingQuery,
    pre_checkout_query => PreCheckoutQuery,
    poll => Poll,
    poll_answer => PollAnswer,
    my_chat_member => MyChatMember,
    chat_member => ChatMember,
    chat_join_request => ChatJoinRequest,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes: Vec<_> = Kind::ALL
            .iter()
            .map(|&kind| (kind, self.registrations(kind).len()))
            .filter(|(_, n)| *n > 0)
            .collect();
        f.debug_struct("Router")
            .field("routes", &routes)
            .field("chain", &self.inner.chain)
            .field("fallback", &self.has_fallback())
            .finish()
    }
}

/// A router nested in another router behaves like a handler. Handler errors
/// of the inner router are passed through unchanged.
#[async_trait]
impl Handler for Router {
    async fn handle(&self, ctx: &Context, update: &Update) -> Result<(), BoxError> {
        match self.dispatch(ctx, update).await {
            Ok(()) => Ok(()),
            Err(DispatchError::Handler(source)) => Err(source),
            Err(e) => Err(e.into()),
        }
    }
}

/// Routes each update with a fresh [`Context`].
impl Service<Update> for Router {
    type Response = Routed;
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<Routed, DispatchError>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, update: Update) -> Self::Future {
        let router = self.clone();
        Box::pin(async move { router.route(&Context::new(), &update).await })
    }
}
