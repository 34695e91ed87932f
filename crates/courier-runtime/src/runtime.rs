//! Concurrent update runtime.
//!
//! The [`Runtime`] pulls updates from a caller-supplied stream and dispatches
//! each one through a [`Router`] in its own task:
//!
//! - at most `max_concurrency` dispatches run at once; the stream is not
//!   polled while the limit is reached
//! - every dispatch gets a fresh [`Context`] whose token is a child of the
//!   runtime's shutdown token
//! - an optional per-update deadline cancels that context and counts the
//!   update as failed
//! - dispatch errors are logged, never propagated
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use courier_runtime::Runtime;
//!
//! let runtime = Runtime::builder().build(router)?;
//! let stats = runtime.run_until_ctrl_c(updates).await?;
//! ```
//!
//! # Shutdown
//!
//! Cancelling [`Runtime::shutdown_token`] stops reading the stream and cancels
//! the contexts of in-flight dispatches. They get `shutdown_grace_ms` to
//! finish before their tasks are aborted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::signal;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use courier_core::{Context, Update};
use courier_framework::{Routed, Router};

use crate::config::{ConfigLoader, ConfigResult, CourierConfig, DispatchConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// Counters describing what a runtime did with the updates it received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Updates taken from the stream.
    pub received: u64,
    /// Updates handled by a registration or the fallback.
    pub handled: u64,
    /// Updates no registration handled and no fallback ran for.
    pub ignored: u64,
    /// Updates whose dispatch failed, timed out, panicked or was aborted.
    pub failed: u64,
}

impl RuntimeStats {
    /// Updates whose dispatch has finished, one way or another.
    pub fn completed(&self) -> u64 {
        self.handled + self.ignored + self.failed
    }
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    handled: AtomicU64,
    ignored: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RuntimeStats {
        RuntimeStats {
            received: self.received.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Dispatches a stream of updates through a router, concurrently.
pub struct Runtime {
    router: Router,
    config: DispatchConfig,
    shutdown: CancellationToken,
    counters: Arc<Counters>,
}

impl Runtime {
    /// Creates a runtime with the default [`DispatchConfig`].
    pub fn new(router: Router) -> Self {
        Self::with_config(router, DispatchConfig::default())
    }

    /// Creates a runtime with the given dispatch settings.
    pub fn with_config(router: Router, config: DispatchConfig) -> Self {
        Self {
            router,
            config,
            shutdown: CancellationToken::new(),
            counters: Arc::default(),
        }
    }

    /// Creates a runtime from a full configuration, initializing logging
    /// first.
    pub fn from_config(router: Router, config: &CourierConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            max_concurrency = config.dispatch.max_concurrency,
            "Runtime initialized from configuration"
        );

        Self::with_config(router, config.dispatch.clone())
    }

    /// Creates a builder that loads the configuration from files and the
    /// environment.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Returns the router updates are dispatched through.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Returns the dispatch settings.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Returns the token that stops the runtime when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Requests shutdown.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Returns the counters accumulated so far.
    pub fn stats(&self) -> RuntimeStats {
        self.counters.snapshot()
    }

    /// Dispatches every update of `updates` until the stream ends or shutdown
    /// is requested, then waits for in-flight dispatches.
    ///
    /// When the stream ends, in-flight dispatches run to completion unless
    /// shutdown is requested meanwhile. Returns the accumulated counters.
    pub async fn serve<S>(&self, updates: S) -> RuntimeStats
    where
        S: Stream<Item = Update>,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut updates = std::pin::pin!(updates);

        info!(
            max_concurrency = self.config.max_concurrency,
            "Runtime is accepting updates"
        );

        loop {
            let permit = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let update = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                next = updates.next() => match next {
                    Some(update) => update,
                    None => {
                        debug!("Update stream ended");
                        break;
                    }
                },
            };

            Counters::bump(&self.counters.received);
            debug!(update_id = update.update_id, "Update received");

            let router = self.router.clone();
            let counters = Arc::clone(&self.counters);
            let ctx = Context::with_cancellation(self.shutdown.child_token());
            let limit = self.config.dispatch_timeout();
            tasks.spawn(async move {
                dispatch_one(&router, &ctx, &update, limit, &counters).await;
                drop(permit);
            });

            while let Some(result) = tasks.try_join_next() {
                self.reap(result);
            }
        }

        self.drain(&mut tasks).await;

        let stats = self.stats();
        info!(
            received = stats.received,
            handled = stats.handled,
            ignored = stats.ignored,
            failed = stats.failed,
            "Runtime stopped"
        );
        stats
    }

    /// Runs [`serve`](Self::serve) until the stream ends or Ctrl+C (or
    /// SIGTERM on Unix) is received.
    pub async fn run_until_ctrl_c<S>(&self, updates: S) -> RuntimeResult<RuntimeStats>
    where
        S: Stream<Item = Update>,
    {
        let serve = self.serve(updates);
        let mut serve = std::pin::pin!(serve);

        tokio::select! {
            stats = &mut serve => return Ok(stats),
            signal = wait_for_shutdown_signal() => {
                signal?;
                self.shutdown();
            }
        }

        Ok(serve.await)
    }

    async fn drain(&self, tasks: &mut JoinSet<()>) {
        if !self.shutdown.is_cancelled() {
            tokio::select! {
                _ = self.join_all(tasks) => return,
                _ = self.shutdown.cancelled() => {}
            }
        }

        if tasks.is_empty() {
            return;
        }

        let grace = self.config.shutdown_grace();
        info!(in_flight = tasks.len(), ?grace, "Waiting for in-flight dispatches");
        if tokio::time::timeout(grace, self.join_all(tasks)).await.is_err() {
            warn!(remaining = tasks.len(), "Grace period elapsed, aborting dispatches");
            tasks.abort_all();
            self.join_all(tasks).await;
        }
    }

    async fn join_all(&self, tasks: &mut JoinSet<()>) {
        while let Some(result) = tasks.join_next().await {
            self.reap(result);
        }
    }

    fn reap(&self, result: Result<(), JoinError>) {
        let Err(e) = result else {
            return;
        };
        if e.is_panic() {
            error!(error = %e, "Dispatch task panicked");
        } else {
            warn!(error = %e, "Dispatch task aborted");
        }
        Counters::bump(&self.counters.failed);
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("router", &self.router)
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

async fn dispatch_one(
    router: &Router,
    ctx: &Context,
    update: &Update,
    limit: Option<Duration>,
    counters: &Counters,
) {
    let outcome = match limit {
        Some(limit) => match tokio::time::timeout(limit, router.route(ctx, update)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                ctx.cancel();
                warn!(update_id = update.update_id, ?limit, "Dispatch timed out");
                Counters::bump(&counters.failed);
                return;
            }
        },
        None => router.route(ctx, update).await,
    };

    match outcome {
        Ok(Routed::Handled { .. } | Routed::Fallback(_)) => Counters::bump(&counters.handled),
        Ok(Routed::Ignored(reason)) => {
            debug!(update_id = update.update_id, ?reason, "Update ignored");
            Counters::bump(&counters.ignored);
        }
        Err(e) => {
            error!(
                update_id = update.update_id,
                filter = e.filter_name(),
                error = %e,
                "Dispatch failed"
            );
            Counters::bump(&counters.failed);
        }
    }
}

/// Waits for Ctrl+C, or SIGTERM on Unix.
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a [`Runtime`] from loaded configuration.
///
/// ```rust,ignore
/// let runtime = Runtime::builder()
///     .config_file("config/courier.toml")
///     .profile("production")
///     .build(router)?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    /// Creates a builder searching the current directory for configuration.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads and validates the configuration, then builds the runtime.
    pub fn build(self, router: Router) -> ConfigResult<Runtime> {
        let config = self.config_loader.load()?;
        validate_config(&config)?;
        Ok(Runtime::from_config(router, &config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use courier_core::{BoxError, UpdateKind};
    use courier_framework::{Filter, FilterExt, filter, handler_fn};
    use futures::stream;
    use serde_json::json;
    use tokio_test::assert_ok;

    fn message(id: i64, text: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": id,
            "message": {
                "message_id": id,
                "date": 0,
                "chat": { "id": 1, "type": "private" },
                "text": text,
            }
        }))
        .unwrap()
    }

    fn text_is(expected: &'static str) -> impl Filter {
        filter::predicate(move |u: &Update| {
            u.message().and_then(|m| m.text.as_deref()) == Some(expected)
        })
    }

    fn failing_filter() -> impl Filter {
        filter::from_fn(|_ctx, update| {
            Box::pin(async move {
                match update.message().and_then(|m| m.text.as_deref()) {
                    Some("boom") => Err(BoxError::from("lookup failed")),
                    _ => Ok(false),
                }
            })
        })
    }

    fn config(max_concurrency: usize) -> DispatchConfig {
        DispatchConfig {
            max_concurrency,
            dispatch_timeout_ms: None,
            shutdown_grace_ms: 50,
        }
    }

    #[tokio::test]
    async fn test_serve_counts_outcomes() {
        let router = Router::new()
            .message(
                handler_fn(|_ctx, _update| Box::pin(async move { Ok(()) })),
                failing_filter().named("remote"),
            )
            .message(
                handler_fn(|_ctx, _update| Box::pin(async move { Ok(()) })),
                text_is("hi"),
            )
            .message(
                handler_fn(|_ctx, _update| Box::pin(async move { Err("nope".into()) })),
                text_is("fail"),
            );
        let runtime = Runtime::with_config(router, config(4));

        let updates = stream::iter(vec![
            message(1, "hi"),
            message(2, "fail"),
            message(3, "boom"),
            message(4, "other"),
            Update::new(5, UpdateKind::Unknown),
            message(6, "hi"),
        ]);
        let stats = runtime.serve(updates).await;

        assert_eq!(
            stats,
            RuntimeStats {
                received: 6,
                handled: 2,
                ignored: 2,
                failed: 2,
            }
        );
        assert_eq!(stats.completed(), stats.received);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_limit() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));

        let router = Router::new().message(
            handler_fn(move |_ctx, _update| {
                let (running, peak) = (Arc::clone(&r), Arc::clone(&p));
                Box::pin(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            }),
            (),
        );
        let runtime = Runtime::with_config(router, config(2));

        let stats = runtime
            .serve(stream::iter((0..10).map(|i| message(i, "x"))))
            .await;

        assert_eq!(stats.handled, 10);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_dispatch_timeout_cancels_context() {
        let router = Router::new().message(
            handler_fn(|ctx, _update| {
                Box::pin(async move {
                    ctx.cancelled().await;
                    Ok(())
                })
            }),
            (),
        );
        let runtime = Runtime::with_config(
            router,
            DispatchConfig {
                dispatch_timeout_ms: Some(10),
                ..config(1)
            },
        );

        let stats = runtime.serve(stream::iter(vec![message(1, "slow")])).await;
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_pending_stream() {
        let runtime = Runtime::new(Router::new());
        let token = runtime.shutdown_token();

        let updates = stream::iter(vec![Update::new(1, UpdateKind::Unknown)]).chain(stream::pending());
        let serve = runtime.serve(updates);
        let stop = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        };

        let (stats, ()) = tokio::join!(serve, stop);
        assert_eq!(stats.received, 1);
        assert_eq!(stats.ignored, 1);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_after_grace() {
        let router = Router::new().message(
            handler_fn(|_ctx, _update| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                })
            }),
            (),
        );
        let runtime = Runtime::with_config(router, config(1));
        let token = runtime.shutdown_token();

        let updates = stream::iter(vec![message(1, "stuck")]).chain(stream::pending());
        let stop = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        };

        let (stats, ()) = tokio::join!(runtime.serve(updates), stop);
        assert_eq!(stats, RuntimeStats { received: 1, failed: 1, ..Default::default() });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_builder_validates() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("courier.toml", "[dispatch]\nmax_concurrency = 0\n")?;

            let result = Runtime::builder()
                .search_path(jail.directory())
                .without_env()
                .build(Router::new());
            assert!(result.is_err());
            Ok(())
        });
    }

    #[tokio::test]
    async fn test_run_until_ctrl_c_returns_when_stream_ends() {
        let runtime = Runtime::new(Router::new());
        let stats = assert_ok!(runtime.run_until_ctrl_c(stream::empty()).await);
        assert_eq!(stats, RuntimeStats::default());
    }
}
