//! Error types for cache operations.
//!
//! Errors are `Clone` because a single load outcome is fanned out to every
//! caller that joined the same in-flight load.

use thiserror::Error;

/// Error type for cache operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The loader returned an error, panicked, or was aborted.
    #[error("Load failed: {0}")]
    Load(String),

    /// The key was invalidated while its load was in flight.
    #[error("Cache entry invalidated while loading: {0}")]
    Invalidated(String),
}

/// Result type alias for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
