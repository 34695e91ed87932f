//! Error types for the Courier framework.

use std::borrow::Cow;
use std::time::Duration;

use thiserror::Error;

use courier_core::BoxError;

/// Errors returned by [`Router::dispatch`](crate::Router::dispatch).
///
/// "Nothing matched" is not an error; see [`Routed`](crate::Routed) for the
/// ways an update can go unhandled.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A filter failed while being evaluated. No handler was invoked and no
    /// later registration was tried.
    #[error("filter {filter}: {source}")]
    Filter {
        /// Diagnostic name of the failing filter.
        filter: Cow<'static, str>,
        /// The error returned by the filter.
        #[source]
        source: BoxError,
    },

    /// The selected handler failed. The source is the handler's error, as is.
    #[error(transparent)]
    Handler(BoxError),
}

impl DispatchError {
    /// Returns the name of the failing filter for filter errors.
    pub fn filter_name(&self) -> Option<&str> {
        match self {
            Self::Filter { filter, .. } => Some(&**filter),
            Self::Handler(_) => None,
        }
    }

    /// Returns `true` if a filter failed.
    pub fn is_filter(&self) -> bool {
        matches!(self, Self::Filter { .. })
    }

    /// Returns `true` if the selected handler failed.
    pub fn is_handler(&self) -> bool {
        matches!(self, Self::Handler(_))
    }

    /// Returns the underlying filter or handler error.
    pub fn into_source(self) -> BoxError {
        match self {
            Self::Filter { source, .. } | Self::Handler(source) => source,
        }
    }
}

/// Errors produced by the built-in middleware.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// The inner handler panicked and the panic was recovered.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The inner handler did not finish in time.
    #[error("handler timed out after {0:?}")]
    TimedOut(Duration),

    /// The dispatch context was cancelled while the handler was running.
    #[error("handler was cancelled")]
    Cancelled,
}
