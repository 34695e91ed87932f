//! Per-update tracing span with outcome and latency.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{Instrument, debug, info_span, warn};

use courier_core::{BoxError, Context, Update};

use super::Middleware;
use crate::handler::{BoxedHandler, Handler};

/// Middleware that runs the inner handler inside an `update` span and logs how
/// it ended. See [`logging`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Logging;

/// Wraps handlers in an `update` span carrying the update id and kind.
///
/// Success is logged at `DEBUG`, failure at `WARN`, both with the elapsed time.
pub fn logging() -> Logging {
    Logging
}

impl Middleware for Logging {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(LoggingHandler { next })
    }
}

struct LoggingHandler {
    next: BoxedHandler,
}

#[async_trait]
impl Handler for LoggingHandler {
    async fn handle(&self, ctx: &Context, update: &Update) -> Result<(), BoxError> {
        let kind = update.kind().map_or("unknown", |k| k.as_str());
        let span = info_span!("update", update_id = update.update_id, kind);

        async {
            let start = Instant::now();
            let result = self.next.handle(ctx, update).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(()) => debug!(?elapsed, "Update handled"),
                Err(e) => warn!(?elapsed, error = %e, "Update handler failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}
