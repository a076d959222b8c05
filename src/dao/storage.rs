//! Failure surface shared by every prediction store backend.

use std::error::Error;

use thiserror::Error;

/// Result alias for prediction store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// The one failure mode surfaced above the backends. Anything going wrong in
/// MongoDB, CouchDB or the in-memory store collapses to an unavailability;
/// callers decide between the save envelope and HTTP 503.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not complete the operation.
    #[error("prediction store unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the underlying failure.
        message: String,
        /// The backend error that caused it, kept as the source chain.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Wrap a backend failure, keeping it as the error source.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
