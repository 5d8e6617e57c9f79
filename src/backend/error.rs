//! Error types for external collaborator calls.

use thiserror::Error;

/// Errors reported by the query and request endpoints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Transport-level failure (connection, timeout, 5xx).
    #[error("Network error: {0}")]
    Network(String),

    /// The server refused the call.
    #[error("Rejected by server: {0}")]
    Rejected(String),

    /// The payload could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
