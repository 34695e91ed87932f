//! Courier Runtime - configuration, logging and the update runtime.
//!
//! This crate provides:
//! - Layered configuration loading with figment (`CourierConfig`, `ConfigLoader`)
//! - Logging configuration on top of `tracing-subscriber` (`LoggingBuilder`)
//! - A concurrent runtime dispatching a stream of updates through a router (`Runtime`)
//!
//! Where updates come from is up to the application: anything that can be
//! turned into a `futures::Stream<Item = Update>` can be served.
//!
//! ```rust,ignore
//! use courier_runtime::Runtime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = Runtime::builder().build(router)?;
//!     let stats = runtime.run_until_ctrl_c(updates).await?;
//!     tracing::info!(?stats, "bye");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, CourierConfig, DispatchConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeStats};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
