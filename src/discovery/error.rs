//! Error types for the discovery feed.

use thiserror::Error;

use crate::access::AccessError;
use crate::cache::CacheError;

/// Error type for discovery operations.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Filters are contradictory or out of range.
    #[error("Invalid filters: {0}")]
    InvalidFilters(String),

    /// Every feed source failed.
    #[error("Discovery unavailable: {0}")]
    Unavailable(String),

    /// The profile is not part of the current feed.
    #[error("Profile not in feed: {0}")]
    NotFound(String),

    /// A cached load failed.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// A consent-gate operation failed.
    #[error("Access error: {0}")]
    Access(#[from] AccessError),
}

/// Result type alias for discovery operations.
pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;
