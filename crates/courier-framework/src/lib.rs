//! # Courier Framework
//!
//! Routing components for building bot applications on top of `courier-core`.
//!
//! This layer provides:
//! - Handler trait for the terminal unit of work
//! - Filter system with boolean combinators and common built-ins
//! - Middleware chains with value semantics
//! - First-match [`Router`] with one registration list per update kind
//!
//! The router is also a [`Handler`] (routers nest) and a
//! `tower::Service<Update>`.

pub mod error;
pub mod filter;
pub mod handler;
pub mod middleware;
pub mod router;

pub use error::{DispatchError, HandlerError};
pub use filter::{BoxedFilter, Filter, FilterExt, IntoFilters};
pub use handler::{BoxedHandler, Handler, HandlerFn, handler_fn};
pub use middleware::{Chain, Middleware, Next};
pub use router::{Registration, Routed, Router, Unhandled};
