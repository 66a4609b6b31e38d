//! Error types for usage metering.

use crate::ids::IdError;

/// Result type for metering operations.
pub type Result<T> = std::result::Result<T, MeteringError>;

/// Errors that can occur in the metering pipeline.
#[derive(Debug, thiserror::Error)]
pub enum MeteringError {
    /// A usage event violated its invariants.
    #[error("invalid usage event: {0}")]
    InvalidEvent(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// The metering backend rejected or failed a delivery.
    #[error("metering backend error: {backend} - {message}")]
    Backend {
        /// The backend that failed.
        backend: String,
        /// Error message.
        message: String,
    },

    /// A delivery did not complete before its deadline.
    #[error("delivery timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The event queue has been closed.
    #[error("event queue closed")]
    QueueClosed,
}

impl MeteringError {
    /// Build a backend error for the named backend.
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }
}
