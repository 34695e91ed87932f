//! Error types shared by every Courier crate.

use thiserror::Error;

/// A boxed error type for the dynamic seams (filters, handlers, middleware).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the core data layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An [`InputFile`](crate::InputFile) without a remote address was serialized.
    #[error("can't marshal InputFile without address")]
    MissingAddress,

    /// The body of a remote input file was requested.
    #[error("input file refers to remote address '{address}' and has no local body")]
    RemoteFile {
        /// The file id or URL.
        address: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
