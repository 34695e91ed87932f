//! # Courier
//!
//! A first-match update router for messaging bots.
//!
//! ## Overview
//!
//! Every inbound update belongs to exactly one of a closed set of kinds
//! (message, callback query, poll answer, ...). Handlers are registered per
//! kind, each optionally guarded by filters and wrapped by the middleware
//! chain active at registration time. Dispatching an update runs the first
//! registration of its kind whose filter accepts it, and nothing else.
//!
//! ```text
//!                      ┌──────────────────────────── Router ─────────────────────────────┐
//! ┌───────────┐        │ message         ─▶ [filter ─▶ chain(handler)] [chain(handler)] │
//! │  Runtime  │──────▶ │ callback_query  ─▶ [filter ─▶ chain(handler)]                  │
//! │ (Stream)  │ update │ ...                                                            │
//! └───────────┘        └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **Core** (`courier-core`): the update model, dispatch context, input files
//! - **Framework** (`courier-framework`): handlers, filters, middleware, the router
//! - **Runtime** (`courier-runtime`): configuration, logging, concurrent serving
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let router = Router::new()
//!         .use_middleware(middleware::logging())
//!         .use_middleware(middleware::recover())
//!         .message(start, filter::command(["start"]))
//!         .message(echo, ());
//!
//!     let runtime = Runtime::builder().build(router)?;
//!     runtime.run_until_ctrl_c(updates).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use courier_core as core;
pub use courier_framework as framework;
pub use courier_runtime as runtime;

pub use courier_framework::{filter, middleware};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use courier_runtime::{Runtime, RuntimeStats};

    // Routing
    pub use courier_framework::{
        BoxedHandler, Chain, DispatchError, Filter, FilterExt, Handler, HandlerError, Middleware,
        Routed, Router, Unhandled, filter, handler_fn, middleware,
    };

    // Update model
    pub use courier_core::{
        BoxError, CallbackQuery, Chat, ChatType, Context, InputFile, Kind, Message, Update,
        UpdateKind, User,
    };

    pub use async_trait::async_trait;
}
