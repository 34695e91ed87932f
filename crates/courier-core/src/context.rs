//! Dispatch context for the Courier router.
//!
//! This module provides [`Context`], the value handed to every filter,
//! middleware and handler alongside the update. It carries the caller's
//! cancellation signal and a small type map of extensions that middleware can
//! use to pass data further down the chain.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

type Extensions = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// The context object passed through a dispatch.
///
/// Cloning a `Context` is cheap and the clone observes the same cancellation
/// token and the same extensions. Use [`child`](Self::child) to derive a
/// context whose cancellation and extensions do not leak back to the parent.
///
/// The router never alters the context it receives; it passes it unchanged to
/// filters and handlers.
///
/// # Example
///
/// ```rust,ignore
/// use courier_core::Context;
///
/// let ctx = Context::new();
/// ctx.insert(RequestId(42));
///
/// let id = ctx.get::<RequestId>();
/// ```
#[derive(Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
    extensions: Arc<RwLock<Extensions>>,
}

impl Context {
    /// Creates a root context with a fresh cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a root context observing the given cancellation token.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            extensions: Arc::default(),
        }
    }

    /// Derives a child context.
    ///
    /// The child is cancelled whenever the parent is, but cancelling the child
    /// leaves the parent untouched. Extensions are copied at this point; later
    /// inserts on either side are not visible to the other.
    pub fn child(&self) -> Self {
        let snapshot = self.extensions.read().clone();
        Self {
            cancel: self.cancel.child_token(),
            extensions: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Returns the cancellation token of this context.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancels this context and every child derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once this context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes when this context is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Stores an extension value, replacing any previous value of the same type.
    ///
    /// Returns `true` if a value was replaced.
    pub fn insert<T>(&self, value: T) -> bool
    where
        T: Send + Sync + 'static,
    {
        self.extensions
            .write()
            .insert(TypeId::of::<T>(), Arc::new(value))
            .is_some()
    }

    /// Returns the extension value of type `T`, if present.
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let value = self.extensions.read().get(&TypeId::of::<T>()).cloned()?;
        value.downcast::<T>().ok()
    }

    /// Returns `true` if an extension of type `T` is present.
    pub fn contains<T: 'static>(&self) -> bool {
        self.extensions.read().contains_key(&TypeId::of::<T>())
    }

    /// Removes the extension value of type `T`.
    pub fn remove<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let value = self.extensions.write().remove(&TypeId::of::<T>())?;
        value.downcast::<T>().ok()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("is_cancelled", &self.is_cancelled())
            .field("extensions", &self.extensions.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Tag(&'static str);

    #[test]
    fn test_extensions_roundtrip() {
        let ctx = Context::new();
        assert!(!ctx.contains::<Tag>());

        assert!(!ctx.insert(Tag("a")));
        assert!(ctx.insert(Tag("b")));
        assert_eq!(ctx.get::<Tag>().as_deref(), Some(&Tag("b")));

        assert_eq!(ctx.remove::<Tag>().as_deref(), Some(&Tag("b")));
        assert!(ctx.get::<Tag>().is_none());
    }

    #[test]
    fn test_clone_shares_extensions() {
        let ctx = Context::new();
        let clone = ctx.clone();
        clone.insert(Tag("shared"));
        assert_eq!(ctx.get::<Tag>().as_deref(), Some(&Tag("shared")));
    }

    #[test]
    fn test_child_does_not_leak_upwards() {
        let parent = Context::new();
        parent.insert(Tag("parent"));

        let child = parent.child();
        assert_eq!(child.get::<Tag>().as_deref(), Some(&Tag("parent")));

        child.insert(Tag("child"));
        assert_eq!(parent.get::<Tag>().as_deref(), Some(&Tag("parent")));

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn test_parent_cancellation_reaches_child() {
        let parent = Context::new();
        let child = parent.child();

        parent.cancel();
        child.cancelled().await;
        assert!(child.is_cancelled());
    }
}
