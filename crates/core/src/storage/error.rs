//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A stored key does not decode into `room/docname/fragment`.
    #[error("malformed storage key: {key}")]
    MalformedKey {
        /// The offending key.
        key: String,
    },

    /// Connectivity, permission or quota failure from the underlying medium.
    #[error("{backend} backend unavailable: {message}")]
    BackendUnavailable {
        /// Backend that failed.
        backend: &'static str,
        /// Backend-specific error message.
        message: String,
    },

    /// Resource already exists while provisioning a bucket or table.
    #[error("resource already exists: {0}")]
    ProvisioningConflict(String),

    /// Backend configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// A reference passed for deletion is not part of the given document.
    #[error("reference {reference} does not belong to document {room}/{docname}")]
    ForeignReference {
        /// The rejected reference.
        reference: String,
        /// Room the caller named.
        room: String,
        /// Document the caller named.
        docname: String,
    },

    /// A document was addressed with an empty room or document name.
    #[error("room and document name must not be empty (room={room:?}, docname={docname:?})")]
    EmptyName {
        /// Room the caller named.
        room: String,
        /// Document the caller named.
        docname: String,
    },

    /// A stored update could not be decoded or applied.
    #[error("crdt update rejected: {0}")]
    Crdt(String),
}

impl StorageError {
    /// Create a malformed key error.
    #[must_use]
    pub fn malformed_key(key: impl Into<String>) -> Self {
        Self::MalformedKey { key: key.into() }
    }

    /// Create a backend unavailable error.
    #[must_use]
    pub fn backend(backend: &'static str, msg: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend,
            message: msg.into(),
        }
    }

    /// Create an empty name error.
    #[must_use]
    pub fn empty_name(room: impl Into<String>, docname: impl Into<String>) -> Self {
        Self::EmptyName {
            room: room.into(),
            docname: docname.into(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a CRDT error.
    #[must_use]
    pub fn crdt(msg: impl Into<String>) -> Self {
        Self::Crdt(msg.into())
    }

    /// Whether this error only reports that a provisioned resource already exists.
    #[must_use]
    pub const fn is_provisioning_conflict(&self) -> bool {
        matches!(self, Self::ProvisioningConflict(_))
    }
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::AlreadyExists => Self::ProvisioningConflict(err.to_string()),
            opendal::ErrorKind::ConfigInvalid => Self::Configuration(err.to_string()),
            _ => Self::BackendUnavailable {
                backend: "object-store",
                message: err.to_string(),
            },
        }
    }
}
