//! Error types for consent-gate operations.

use thiserror::Error;

use super::types::{ContactEvent, ContactStatus, MirrorState};
use crate::backend::BackendError;

/// Error type for access operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The event is not allowed from the current contact status.
    #[error("Invalid contact transition from {from:?} on {event:?}")]
    InvalidTransition {
        /// Status the transition started from.
        from: ContactStatus,
        /// Event that was rejected.
        event: ContactEvent,
    },

    /// Contact requests require mirror access first.
    #[error("Contact locked: mirror state is {}", .0.as_str())]
    ContactLocked(MirrorState),

    /// A mirror request is not possible from the current mirror state.
    #[error("Mirror request unavailable: mirror state is {}", .0.as_str())]
    MirrorUnavailable(MirrorState),

    /// The server declined the submission.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The request endpoint failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type alias for access operations.
pub type AccessResult<T> = std::result::Result<T, AccessError>;
