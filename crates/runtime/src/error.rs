//! Startup error types.

use thiserror::Error;
use ystore_core::StorageError;

use crate::delivery::DeliveryError;

/// Errors that abort process startup.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The selected backend could not be built or provisioned.
    #[error("storage backend {backend} failed to start: {source}")]
    Storage {
        /// Selected backend.
        backend: &'static str,
        /// Underlying storage error.
        #[source]
        source: StorageError,
    },

    /// The relational backend could not connect.
    #[error("database connection failed: {0}")]
    Database(String),

    /// The update callback is misconfigured.
    #[error("update callback misconfigured: {0}")]
    Callback(#[from] DeliveryError),
}

impl StartupError {
    /// Create a storage startup error.
    #[must_use]
    pub const fn storage(backend: &'static str, source: StorageError) -> Self {
        Self::Storage { backend, source }
    }

    /// Create a database connection error.
    #[must_use]
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }
}
