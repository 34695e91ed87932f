//! Filter system for the Courier framework.
//!
//! A [`Filter`] answers "should this registration handle the update?". Unlike
//! a plain predicate it may fail, for instance when it has to ask the platform
//! about a chat member, and a failure aborts the whole dispatch.
//!
//! Filters compose: [`all`], [`any`] and [`not`] are filters themselves, so
//! arbitrary nesting is possible.
//!
//! ```rust,ignore
//! use courier_framework::filter::{self, FilterExt};
//!
//! let admin_command = filter::command(["ban", "kick"])
//!     .and(is_admin)
//!     .named("admin_command");
//! ```
//!
//! # Determinism
//!
//! Filters are built once at setup and shared by every dispatch. They should
//! hold no mutable state and give the same answer for the same inputs.

mod builtin;
mod combinator;

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use courier_core::{BoxError, Context, Update};

pub use builtin::{Command, callback_data_prefix, chat_type, command, text};
pub use combinator::{All, Any, Not, all, any, not};

/// A predicate gating whether a registration applies to an update.
#[async_trait]
pub trait Filter: Send + Sync + 'static {
    /// Evaluates the filter.
    async fn allow(&self, ctx: &Context, update: &Update) -> Result<bool, BoxError>;

    /// Identity used in error messages. Defaults to the type name.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }
}

/// A type-erased, shareable filter.
pub type BoxedFilter = Arc<dyn Filter>;

#[async_trait]
impl<F> Filter for Arc<F>
where
    F: Filter + ?Sized,
{
    async fn allow(&self, ctx: &Context, update: &Update) -> Result<bool, BoxError> {
        (**self).allow(ctx, update).await
    }

    fn name(&self) -> Cow<'static, str> {
        (**self).name()
    }
}

// ============================================================================
// Closure-based filters
// ============================================================================

/// A synchronous, infallible filter. See [`predicate`].
#[derive(Clone)]
pub struct Predicate<F> {
    f: F,
}

/// Creates an infallible filter from a synchronous closure over the update.
pub fn predicate<F>(f: F) -> Predicate<F>
where
    F: Fn(&Update) -> bool + Send + Sync + 'static,
{
    Predicate { f }
}

#[async_trait]
impl<F> Filter for Predicate<F>
where
    F: Fn(&Update) -> bool + Send + Sync + 'static,
{
    async fn allow(&self, _ctx: &Context, update: &Update) -> Result<bool, BoxError> {
        Ok((self.f)(update))
    }
}

/// An asynchronous, fallible filter. See [`from_fn`].
#[derive(Clone)]
pub struct FnFilter<F> {
    f: F,
}

/// Creates a filter from a closure returning a boxed future.
///
/// ```rust,ignore
/// let is_member = filter::from_fn(|ctx, update| Box::pin(async move {
///     let chat = update.chat().ok_or("no chat")?;
///     Ok(members.contains(ctx, chat.id).await?)
/// }));
/// ```
pub fn from_fn<F>(f: F) -> FnFilter<F>
where
    F: for<'a> Fn(&'a Context, &'a Update) -> BoxFuture<'a, Result<bool, BoxError>>
        + Send
        + Sync
        + 'static,
{
    FnFilter { f }
}

#[async_trait]
impl<F> Filter for FnFilter<F>
where
    F: for<'a> Fn(&'a Context, &'a Update) -> BoxFuture<'a, Result<bool, BoxError>>
        + Send
        + Sync
        + 'static,
{
    async fn allow(&self, ctx: &Context, update: &Update) -> Result<bool, BoxError> {
        (self.f)(ctx, update).await
    }
}

/// A filter with an explicit diagnostic name. See [`FilterExt::named`].
#[derive(Clone)]
pub struct Named<F> {
    inner: F,
    name: Cow<'static, str>,
}

#[async_trait]
impl<F: Filter> Filter for Named<F> {
    async fn allow(&self, ctx: &Context, update: &Update) -> Result<bool, BoxError> {
        self.inner.allow(ctx, update).await
    }

    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }
}

// ============================================================================
// FilterExt
// ============================================================================

/// Combinator methods available on every [`Filter`].
pub trait FilterExt: Filter + Sized {
    /// Matches when both filters match; `self` is evaluated first.
    fn and<F: Filter>(self, other: F) -> All {
        All::new(vec![Arc::new(self), Arc::new(other)])
    }

    /// Matches when either filter matches; `self` is evaluated first.
    fn or<F: Filter>(self, other: F) -> Any {
        Any::new(vec![Arc::new(self), Arc::new(other)])
    }

    /// Inverts the result of this filter.
    fn not(self) -> Not<Self> {
        Not::new(self)
    }

    /// Overrides the name reported when this filter fails.
    fn named(self, name: impl Into<Cow<'static, str>>) -> Named<Self> {
        Named {
            inner: self,
            name: name.into(),
        }
    }

    /// Erases the type of this filter.
    fn boxed(self) -> BoxedFilter {
        Arc::new(self)
    }
}

impl<F: Filter> FilterExt for F {}

// ============================================================================
// IntoFilters
// ============================================================================

/// Anything that can be turned into the filter list of a registration.
///
/// - `()`: no filter, the registration always matches
/// - a single filter
/// - a tuple of up to eight filters
/// - a `Vec<BoxedFilter>`
pub trait IntoFilters {
    /// Converts `self` into a list of filters.
    fn into_filters(self) -> Vec<BoxedFilter>;
}

impl IntoFilters for () {
    fn into_filters(self) -> Vec<BoxedFilter> {
        Vec::new()
    }
}

impl<F: Filter> IntoFilters for F {
    fn into_filters(self) -> Vec<BoxedFilter> {
        vec![Arc::new(self)]
    }
}

impl IntoFilters for Vec<BoxedFilter> {
    fn into_filters(self) -> Vec<BoxedFilter> {
        self
    }
}

macro_rules! impl_into_filters_for_tuple {
    ($($ty:ident),+) => {
        impl<$($ty: Filter),+> IntoFilters for ($($ty,)+) {
            #[allow(non_snake_case)]
            fn into_filters(self) -> Vec<BoxedFilter> {
                let ($($ty,)+) = self;
                vec![$(Arc::new($ty) as BoxedFilter),+]
            }
        }
    };
}

impl_into_filters_for_tuple!(F1);
impl_into_filters_for_tuple!(F1, F2);
impl_into_filters_for_tuple!(F1, F2, F3);
impl_into_filters_for_tuple!(F1, F2, F3, F4);
impl_into_filters_for_tuple!(F1, F2, F3, F4, F5);
impl_into_filters_for_tuple!(F1, F2, F3, F4, F5, F6);
impl_into_filters_for_tuple!(F1, F2, F3, F4, F5, F6, F7);
impl_into_filters_for_tuple!(F1, F2, F3, F4, F5, F6, F7, F8);

/// Collapses a filter list into the filter stored by a registration.
///
/// No filter yields `None` (always match), a single filter is used as is and
/// several filters are combined with [`all`].
pub fn compact_filter(mut filters: Vec<BoxedFilter>) -> Option<BoxedFilter> {
    match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(Arc::new(All::new(filters))),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording filters shared by the filter and router tests.

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// A filter returning a fixed answer and counting its evaluations.
    #[derive(Clone)]
    pub struct Fixed {
        pub answer: Result<bool, &'static str>,
        pub calls: Arc<AtomicUsize>,
    }

    impl Fixed {
        pub fn new(answer: Result<bool, &'static str>) -> Self {
            Self {
                answer,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Filter for Fixed {
        async fn allow(&self, _ctx: &Context, _update: &Update) -> Result<bool, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.map_err(Into::into)
        }

        fn name(&self) -> Cow<'static, str> {
            match self.answer {
                Ok(true) => "yes".into(),
                Ok(false) => "no".into(),
                Err(_) => "broken".into(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Fixed;
    use super::*;
    use courier_core::UpdateKind;
    use tokio_test::{assert_err, assert_ok};

    fn unknown() -> Update {
        Update::new(1, UpdateKind::Unknown)
    }

    #[test]
    fn test_compact_filter_shapes() {
        assert!(compact_filter(().into_filters()).is_none());

        let single = compact_filter(Fixed::new(Ok(true)).into_filters()).unwrap();
        assert_eq!(single.name(), "yes");

        let several =
            compact_filter((Fixed::new(Ok(true)), Fixed::new(Ok(false))).into_filters()).unwrap();
        assert_eq!(several.name(), "all(yes, no)");
    }

    #[tokio::test]
    async fn test_predicate_and_from_fn() {
        let ctx = Context::new();
        let update = unknown();

        let odd = predicate(|u: &Update| u.update_id % 2 == 1);
        assert!(assert_ok!(odd.allow(&ctx, &update).await));

        let cancelled = from_fn(|ctx, _update| Box::pin(async move { Ok(ctx.is_cancelled()) }));
        assert!(!assert_ok!(cancelled.allow(&ctx, &update).await));
        ctx.cancel();
        assert!(assert_ok!(cancelled.allow(&ctx, &update).await));
    }

    #[tokio::test]
    async fn test_named_overrides_name_only() {
        let named = Fixed::new(Err("boom")).named("membership");
        assert_eq!(named.name(), "membership");

        let err = assert_err!(named.allow(&Context::new(), &unknown()).await);
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_default_name_is_type_name() {
        let f = predicate(|_: &Update| true);
        assert!(f.name().contains("Predicate"));
    }
}
