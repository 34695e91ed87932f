//! Deadline and cancellation for the inner handler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use courier_core::{BoxError, Context, Update};

use super::Middleware;
use crate::error::HandlerError;
use crate::handler::{BoxedHandler, Handler};

/// Middleware bounding the inner handler's run time. See [`timeout`].
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    limit: Duration,
}

/// Fails with [`HandlerError::TimedOut`] when the inner handler takes longer
/// than `limit`, and with [`HandlerError::Cancelled`] when the dispatch
/// context is cancelled first.
///
/// The inner handler runs with a child context whose token is cancelled when
/// the deadline passes, so cooperative handlers can stop their own work.
pub fn timeout(limit: Duration) -> Timeout {
    Timeout { limit }
}

impl Middleware for Timeout {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(TimeoutHandler {
            limit: self.limit,
            next,
        })
    }
}

struct TimeoutHandler {
    limit: Duration,
    next: BoxedHandler,
}

#[async_trait]
impl Handler for TimeoutHandler {
    async fn handle(&self, ctx: &Context, update: &Update) -> Result<(), BoxError> {
        let child = ctx.child();

        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                child.cancel();
                Err(HandlerError::Cancelled.into())
            }
            result = tokio::time::timeout(self.limit, self.next.handle(&child, update)) => {
                match result {
                    Ok(result) => result,
                    Err(_) => {
                        child.cancel();
                        warn!(update_id = update.update_id, limit = ?self.limit, "Handler timed out");
                        Err(HandlerError::TimedOut(self.limit).into())
                    }
                }
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

    fn sleeper(millis: u64) -> BoxedHandler {
        Arc::new(handler_fn(move |_ctx, _update| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(())
            })
        }))
    }

    fn update() -> Update {
        Update::new(1, UpdateKind::Unknown)
    }

    #[tokio::test]
    async fn test_fast_handler_passes() {
        let handler = timeout(Duration::from_secs(5)).wrap(sleeper(1));
        assert_ok!(handler.handle(&Context::new(), &update()).await);
    }

    #[tokio::test]
    async fn test_slow_handler_times_out() {
        let limit = Duration::from_millis(10);
        let handler = timeout(limit).wrap(sleeper(5_000));

        let err = assert_err!(handler.handle(&Context::new(), &update()).await);
        let err = err.downcast::<HandlerError>().unwrap();
        assert!(matches!(*err, HandlerError::TimedOut(d) if d == limit));
    }

    #[tokio::test]
    async fn test_cancelled_context_stops_handler() {
        let handler = timeout(Duration::from_secs(5)).wrap(sleeper(5_000));
        let ctx = Context::new();
        ctx.cancel();

        let err = assert_err!(handler.handle(&ctx, &update()).await);
        let err = err.downcast::<HandlerError>().unwrap();
        assert!(matches!(*err, HandlerError::Cancelled));
    }

    #[tokio::test]
    async fn test_inner_sees_child_cancellation_on_timeout() {
        let seen = Context::new();
        let slot = seen.clone();
        let inner: BoxedHandler = Arc::new(handler_fn(move |ctx, _update| {
            let slot = slot.clone();
            Box::pin(async move {
                slot.insert(ctx.clone());
                ctx.cancelled().await;
                Ok(())
            })
        }));

        let handler = timeout(Duration::from_millis(10)).wrap(inner);
        assert_err!(handler.handle(&Context::new(), &update()).await);

        let child = seen.get::<Context>().unwrap();
        assert!(child.is_cancelled());
    }
}
