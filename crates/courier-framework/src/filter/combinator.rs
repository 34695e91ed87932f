//! Boolean combinators over filters.
//!
//! Sub-filters are evaluated left to right and evaluation stops as soon as the
//! outcome is known, so later sub-filters may never run. An error from a
//! sub-filter stops evaluation and is returned unchanged.

use std::borrow::Cow;

use async_trait::async_trait;

use courier_core::{BoxError, Context, Update};

use super::{BoxedFilter, Filter, IntoFilters};

fn join_names(op: &str, filters: &[BoxedFilter]) -> Cow<'static, str> {
    let names: Vec<_> = filters.iter().map(|f| f.name()).collect();
    Cow::Owned(format!("{op}({})", names.join(", ")))
}

/// Matches when every sub-filter matches. An empty `All` matches.
#[derive(Clone)]
pub struct All {
    filters: Vec<BoxedFilter>,
}

impl All {
    /// Creates the conjunction of `filters`.
    pub fn new(filters: Vec<BoxedFilter>) -> Self {
        Self { filters }
    }
}

/// Matches when every filter in `filters` matches.
pub fn all(filters: impl IntoFilters) -> All {
    All::new(filters.into_filters())
}

#[async_trait]
impl Filter for All {
    async fn allow(&self, ctx: &Context, update: &Update) -> Result<bool, BoxError> {
        for filter in &self.filters {
            if !filter.allow(ctx, update).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn name(&self) -> Cow<'static, str> {
        join_names("all", &self.filters)
    }
}

/// Matches when at least one sub-filter matches. An empty `Any` rejects.
#[derive(Clone)]
pub struct Any {
    filters: Vec<BoxedFilter>,
}

impl Any {
    /// Creates the disjunction of `filters`.
    pub fn new(filters: Vec<BoxedFilter>) -> Self {
        Self { filters }
    }
}

/// Matches when any filter in `filters` matches.
pub fn any(filters: impl IntoFilters) -> Any {
    Any::new(filters.into_filters())
}

#[async_trait]
impl Filter for Any {
    async fn allow(&self, ctx: &Context, update: &Update) -> Result<bool, BoxError> {
        for filter in &self.filters {
            if filter.allow(ctx, update).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn name(&self) -> Cow<'static, str> {
        join_names("any", &self.filters)
    }
}

/// Inverts the result of the inner filter.
#[derive(Clone)]
pub struct Not<F> {
    inner: F,
}

impl<F: Filter> Not<F> {
    /// Creates the negation of `inner`.
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

/// Matches when `filter` does not.
pub fn not<F: Filter>(filter: F) -> Not<F> {
    Not::new(filter)
}

#[async_trait]
impl<F: Filter> Filter for Not<F> {
    async fn allow(&self, ctx: &Context, update: &Update) -> Result<bool, BoxError> {
        self.inner.allow(ctx, update).await.map(|matched| !matched)
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("not({})", self.inner.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterExt;
    use crate::filter::testing::Fixed;
    use courier_core::UpdateKind;
    use tokio_test::{assert_err, assert_ok};

    fn update() -> Update {
        Update::new(1, UpdateKind::Unknown)
    }

    #[tokio::test]
    async fn test_all_stops_at_first_rejection() {
        let (a, b, c) = (Fixed::new(Ok(true)), Fixed::new(Ok(false)), Fixed::new(Ok(true)));
        let filter = all((a.clone(), b.clone(), c.clone()));

        assert!(!assert_ok!(filter.allow(&Context::new(), &update()).await));
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_all_stops_at_first_error() {
        let (a, b) = (Fixed::new(Err("down")), Fixed::new(Ok(true)));
        let filter = all((a.clone(), b.clone()));

        let err = assert_err!(filter.allow(&Context::new(), &update()).await);
        assert_eq!(err.to_string(), "down");
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_any_stops_at_first_match() {
        let (a, b, c) = (Fixed::new(Ok(false)), Fixed::new(Ok(true)), Fixed::new(Err("never")));
        let filter = any((a.clone(), b.clone(), c.clone()));

        assert!(assert_ok!(filter.allow(&Context::new(), &update()).await));
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_any_stops_at_first_error() {
        let (a, b, c) = (Fixed::new(Ok(false)), Fixed::new(Err("down")), Fixed::new(Ok(true)));
        let filter = any((a.clone(), b.clone(), c.clone()));

        let err = assert_err!(filter.allow(&Context::new(), &update()).await);
        assert_eq!(err.to_string(), "down");
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_empty_combinators() {
        let ctx = Context::new();
        assert!(assert_ok!(all(()).allow(&ctx, &update()).await));
        assert!(!assert_ok!(any(()).allow(&ctx, &update()).await));
    }

    #[tokio::test]
    async fn test_not_inverts_and_propagates_errors() {
        let ctx = Context::new();
        assert!(!assert_ok!(not(Fixed::new(Ok(true))).allow(&ctx, &update()).await));
        assert!(assert_ok!(Fixed::new(Ok(false)).not().allow(&ctx, &update()).await));

        let err = assert_err!(not(Fixed::new(Err("bad"))).allow(&ctx, &update()).await);
        assert_eq!(err.to_string(), "bad");
    }

    #[test]
    fn test_nested_names() {
        let filter = Fixed::new(Ok(true)).or(not(Fixed::new(Ok(false))));
        assert_eq!(filter.name(), "any(yes, not(no))");
    }
}
