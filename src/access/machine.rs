//! Pure access state machine.
//!
//! Maps raw request and visibility data to an effective [`AccessState`].
//! Nothing here performs I/O or keeps state between calls, so the feed
//! re-evaluates every profile on each refresh.
//!
//! # Mirror Precedence
//!
//! | Order | State      | Condition                                      |
//! |-------|------------|------------------------------------------------|
//! | 1     | `accepted` | connected, or an accepted request from viewer  |
//! | 2     | `public`   | visibility is public                           |
//! | 3     | `pending`  | a pending request from viewer exists           |
//! | 4     | `rejected` | viewer's most recent request was rejected      |
//! | 5     | `private`  | otherwise                                      |
//!
//! Contact is unlocked only for `accepted` and `public`.

use super::error::{AccessError, AccessResult};
use super::types::{
    AccessState, ContactEvent, ContactGate, ContactRequestStatus, ContactStatus, MirrorRequest,
    MirrorRequestStatus, MirrorState, MirrorVisibility, ProfileId,
};

/// Everything the state machine looks at for one (viewer, target) pair.
#[derive(Debug, Clone, Copy)]
pub struct AccessInputs<'a> {
    /// The user looking at the feed.
    pub viewer: &'a ProfileId,
    /// The profile being evaluated.
    pub target: &'a ProfileId,
    /// Whether the connections query lists the target.
    pub connected: bool,
    /// Target's mirror visibility setting.
    pub visibility: MirrorVisibility,
    /// Mirror request snapshots; entries not from viewer to target are ignored.
    pub mirror_requests: &'a [MirrorRequest],
    /// Effective contact status (server snapshot folded with local intent).
    pub contact: ContactStatus,
}

/// Computes the effective mirror state.
#[must_use]
pub fn mirror_state(inputs: &AccessInputs<'_>) -> MirrorState {
    let from_viewer = inputs
        .mirror_requests
        .iter()
        .filter(|r| r.is_between(inputs.viewer, inputs.target));

    let mut any_accepted = false;
    let mut any_pending = false;
    let mut latest: Option<&MirrorRequest> = None;

    for request in from_viewer {
        match request.status {
            MirrorRequestStatus::Accepted => any_accepted = true,
            MirrorRequestStatus::Pending => any_pending = true,
            MirrorRequestStatus::Rejected => {}
        }
        if latest.map_or(true, |l| request.created_at >= l.created_at) {
            latest = Some(request);
        }
    }

    if inputs.connected || any_accepted {
        MirrorState::Accepted
    } else if inputs.visibility == MirrorVisibility::Public {
        MirrorState::Public
    } else if any_pending {
        MirrorState::Pending
    } else if latest.is_some_and(|l| l.status == MirrorRequestStatus::Rejected) {
        MirrorState::Rejected
    } else {
        MirrorState::Private
    }
}

/// Returns whether a contact request may be issued from `mirror`.
#[must_use]
pub const fn can_request_contact(mirror: MirrorState) -> bool {
    mirror.grants_view()
}

/// Derives the contact gate from the mirror state.
#[must_use]
pub const fn contact_gate(mirror: MirrorState, contact: ContactStatus) -> ContactGate {
    if can_request_contact(mirror) {
        ContactGate::Unlocked(contact)
    } else {
        ContactGate::Locked
    }
}

/// Evaluates the full access state for one profile.
#[must_use]
pub fn evaluate(inputs: &AccessInputs<'_>) -> AccessState {
    let mirror = mirror_state(inputs);
    let mirror_requested = inputs
        .mirror_requests
        .iter()
        .any(|r| r.is_between(inputs.viewer, inputs.target));

    AccessState {
        mirror,
        contact: contact_gate(mirror, inputs.contact),
        mirror_requested,
    }
}

impl ContactStatus {
    /// Maps a server snapshot to a status. No record means idle.
    #[must_use]
    pub const fn from_server(server: Option<ContactRequestStatus>) -> Self {
        match server {
            None => Self::Idle,
            Some(ContactRequestStatus::Requested) => Self::Requested,
            Some(ContactRequestStatus::Accepted) => Self::Accepted,
        }
    }

    /// Applies `event`, returning the next status.
    ///
    /// `Accepted` is reachable only through [`ContactEvent::Refreshed`];
    /// local events can never grant messaging rights.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidTransition`] if `event` is not allowed
    /// from `self`.
    pub fn apply(self, event: ContactEvent) -> AccessResult<Self> {
        match (self, event) {
            (_, ContactEvent::Refreshed(server)) => Ok(Self::from_server(server)),
            (Self::Idle, ContactEvent::Submit) => Ok(Self::Requesting),
            (Self::Requesting, ContactEvent::Acknowledged) => Ok(Self::Requested),
            (Self::Requesting, ContactEvent::Failed) => Ok(Self::Idle),
            (from, event) => Err(AccessError::InvalidTransition { from, event }),
        }
    }
}
