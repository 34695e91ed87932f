//! Turns handler panics into errors.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::error;

use courier_core::{BoxError, Context, Update};

use super::Middleware;
use crate::error::HandlerError;
use crate::handler::{BoxedHandler, Handler};

/// Middleware catching panics from the inner handler. See [`recover`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Recover;

/// Catches a panic in the inner handler and returns
/// [`HandlerError::Panicked`] instead, keeping the worker alive.
pub fn recover() -> Recover {
    Recover
}

impl Middleware for Recover {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(RecoverHandler { next })
    }
}

struct RecoverHandler {
    next: BoxedHandler,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[async_trait]
impl Handler for RecoverHandler {
    async fn handle(&self, ctx: &Context, update: &Update) -> Result<(), BoxError> {
        match AssertUnwindSafe(self.next.handle(ctx, update))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(update_id = update.update_id, panic = %message, "Handler panicked");
                Err(HandlerError::Panicked(message).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use courier_core::UpdateKind;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let handler = recover().wrap(Arc::new(handler_fn(|_ctx, update| {
            Box::pin(async move {
                if update.update_id == 13 {
                    panic!("unlucky update");
                }
                Ok(())
            })
        })));

        let ctx = Context::new();
        assert_ok!(handler.handle(&ctx, &Update::new(1, UpdateKind::Unknown)).await);

        let err = assert_err!(handler.handle(&ctx, &Update::new(13, UpdateKind::Unknown)).await);
        let err = err.downcast::<HandlerError>().unwrap();
        assert!(matches!(*err, HandlerError::Panicked(ref m) if m == "unlucky update"));
    }

    #[test]
    fn test_panic_message_formats() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
