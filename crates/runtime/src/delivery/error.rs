//! Delivery error types.

use std::time::Duration;

use thiserror::Error;

/// Update delivery errors.
///
/// None of these reach the document hub; the worker logs them with the room and moves on.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The configured base URL cannot address rooms.
    #[error("invalid callback endpoint: {0}")]
    InvalidEndpoint(String),

    /// No response within the configured timeout; the request was aborted.
    #[error("delivery for room {room} timed out after {after:?}")]
    Timeout {
        /// Room whose state was being delivered.
        room: String,
        /// Configured timeout.
        after: Duration,
    },

    /// The endpoint answered with a non-success status.
    #[error("callback rejected delivery with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The request failed before a response arrived.
    #[error("callback transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Aborted by shutdown.
    #[error("delivery cancelled")]
    Cancelled,
}

impl DeliveryError {
    /// Create an invalid endpoint error.
    #[must_use]
    pub fn invalid_endpoint(msg: impl Into<String>) -> Self {
        Self::InvalidEndpoint(msg.into())
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(room: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            room: room.into(),
            after,
        }
    }

    /// Create a rejected error.
    #[must_use]
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            body: body.into(),
        }
    }
}
