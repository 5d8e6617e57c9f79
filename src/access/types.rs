//! Core types for the consent gate.
//!
//! Server records ([`MirrorRequest`], [`ContactRequest`]) are immutable
//! snapshots. Derived states ([`MirrorState`], [`ContactStatus`],
//! [`ContactGate`]) are closed enums so that combinations such as "rejected
//! but allowed to request contact" cannot be expressed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque user/profile identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    /// Creates an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProfileId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Who may see a user's mirror without asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorVisibility {
    /// Anyone may view the mirror.
    Public,
    /// Viewing requires an accepted mirror request.
    #[default]
    OnRequest,
    /// Viewing requires an accepted mirror request; not advertised.
    Private,
}

impl MirrorVisibility {
    /// Converts to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::OnRequest => "on_request",
            Self::Private => "private",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "on_request" => Some(Self::OnRequest),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// Server-side status of a mirror request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorRequestStatus {
    /// Awaiting the receiver's decision.
    Pending,
    /// Receiver granted access.
    Accepted,
    /// Receiver declined.
    Rejected,
}

impl MirrorRequestStatus {
    /// Converts to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns whether no further transitions can occur.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }
}

/// A request to view another user's mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRequest {
    /// Requesting user.
    pub sender: ProfileId,
    /// User whose mirror is requested.
    pub receiver: ProfileId,
    /// Current status.
    pub status: MirrorRequestStatus,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When the receiver responded, if they have.
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
}

impl MirrorRequest {
    /// Returns whether this request goes from `sender` to `receiver`.
    #[must_use]
    pub fn is_between(&self, sender: &ProfileId, receiver: &ProfileId) -> bool {
        &self.sender == sender && &self.receiver == receiver
    }
}

/// Server-side status of a contact request.
///
/// There is no server-side "idle": the absence of a record means idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactRequestStatus {
    /// Sent, not yet accepted.
    #[serde(alias = "pending")]
    Requested,
    /// Receiver agreed to direct messaging.
    Accepted,
}

/// A request to start direct messaging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRequest {
    /// Requesting user.
    pub sender: ProfileId,
    /// User being contacted.
    pub receiver: ProfileId,
    /// Current status.
    pub status: ContactRequestStatus,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
}

/// Server reply to a contact request submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRequestAck {
    /// Whether the server recorded the request.
    pub success: bool,
    /// Human-readable detail.
    #[serde(default)]
    pub message: String,
}

/// Per-profile request snapshot as read from the request endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessRecord {
    /// Mirror requests from the viewer to the profile, any order.
    #[serde(default)]
    pub mirror_requests: Vec<MirrorRequest>,
    /// Contact request from the viewer to the profile, if any.
    #[serde(default)]
    pub contact_request: Option<ContactRequest>,
}

/// Effective contact status as shown to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactStatus {
    /// No request made.
    #[default]
    Idle,
    /// Submitted locally, awaiting the server.
    Requesting,
    /// Server recorded the request.
    Requested,
    /// Receiver accepted; messaging is unlocked.
    Accepted,
}

impl ContactStatus {
    /// Converts to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Requested => "requested",
            Self::Accepted => "accepted",
        }
    }
}

/// Events driving [`ContactStatus`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactEvent {
    /// The viewer asked to contact the profile.
    Submit,
    /// The server confirmed the submission.
    Acknowledged,
    /// The server rejected the submission or the call failed.
    Failed,
    /// A refreshed server snapshot arrived.
    Refreshed(Option<ContactRequestStatus>),
}

/// Effective mirror access state, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorState {
    /// Access granted through an accepted request.
    Accepted,
    /// Mirror is public.
    Public,
    /// A request from the viewer awaits a response.
    Pending,
    /// The viewer's most recent request was declined.
    Rejected,
    /// No access and nothing outstanding.
    Private,
}

impl MirrorState {
    /// Converts to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Public => "public",
            Self::Pending => "pending",
            Self::Rejected => "rejected",
            Self::Private => "private",
        }
    }

    /// Returns whether the viewer may see the mirror.
    #[must_use]
    pub const fn grants_view(&self) -> bool {
        matches!(self, Self::Accepted | Self::Public)
    }
}

/// Mirror action offered to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorAction {
    /// Open the mirror.
    ViewMirror,
    /// Disabled while a request is outstanding.
    AwaitingResponse,
    /// Disabled after the profile declined.
    Declined,
    /// Ask the profile for mirror access.
    RequestAccess,
}

impl MirrorAction {
    /// Returns the display label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ViewMirror => "view mirror",
            Self::AwaitingResponse => "awaiting response",
            Self::Declined => "declined",
            Self::RequestAccess => "request mirror access",
        }
    }

    /// Returns whether the action can be triggered.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::ViewMirror | Self::RequestAccess)
    }
}

/// Contact action offered to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactAction {
    /// Open a conversation.
    StartConversation,
    /// Disabled while the submission is in flight.
    Sending,
    /// Disabled once the server recorded the request.
    RequestSent,
    /// Ask the profile for contact.
    RequestContact,
}

impl ContactAction {
    /// Returns the display label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::StartConversation => "start conversation",
            Self::Sending => "sending…",
            Self::RequestSent => "request sent",
            Self::RequestContact => "request contact",
        }
    }

    /// Returns whether the action can be triggered.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::StartConversation | Self::RequestContact)
    }
}

/// Contact availability, gated by mirror access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactGate {
    /// Mirror access not established; no contact action exists.
    Locked,
    /// Mirror access established; contact follows this status.
    Unlocked(ContactStatus),
}

/// Coarse relationship bucket used by the feed status filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipStage {
    /// Nothing attempted yet.
    New,
    /// A mirror or contact request is outstanding.
    Pending,
    /// Mirror access established.
    Accepted,
    /// The viewer's mirror request was declined.
    Declined,
}

/// Full derived access state for one profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessState {
    /// Effective mirror state.
    pub mirror: MirrorState,
    /// Contact gate derived from `mirror`.
    pub contact: ContactGate,
    /// Whether any mirror request from the viewer exists.
    pub mirror_requested: bool,
}

impl AccessState {
    /// Returns the mirror action.
    #[must_use]
    pub const fn mirror_action(&self) -> MirrorAction {
        match self.mirror {
            MirrorState::Accepted | MirrorState::Public => MirrorAction::ViewMirror,
            MirrorState::Pending => MirrorAction::AwaitingResponse,
            MirrorState::Rejected => MirrorAction::Declined,
            MirrorState::Private => MirrorAction::RequestAccess,
        }
    }

    /// Returns the contact action, or `None` while the gate is locked.
    #[must_use]
    pub const fn contact_action(&self) -> Option<ContactAction> {
        match self.contact {
            ContactGate::Locked => None,
            ContactGate::Unlocked(ContactStatus::Accepted) => {
                Some(ContactAction::StartConversation)
            }
            ContactGate::Unlocked(ContactStatus::Requesting) => Some(ContactAction::Sending),
            ContactGate::Unlocked(ContactStatus::Requested) => Some(ContactAction::RequestSent),
            ContactGate::Unlocked(ContactStatus::Idle) => Some(ContactAction::RequestContact),
        }
    }

    /// Returns whether a contact request may be issued at all.
    #[must_use]
    pub const fn can_request_contact(&self) -> bool {
        matches!(self.contact, ContactGate::Unlocked(_))
    }

    /// Returns the effective contact status, if unlocked.
    #[must_use]
    pub const fn contact_status(&self) -> Option<ContactStatus> {
        match self.contact {
            ContactGate::Locked => None,
            ContactGate::Unlocked(status) => Some(status),
        }
    }

    /// Buckets the state for feed filtering.
    #[must_use]
    pub const fn stage(&self) -> RelationshipStage {
        match (self.mirror, self.contact) {
            (MirrorState::Accepted, _) => RelationshipStage::Accepted,
            (MirrorState::Pending, _)
            | (
                _,
                ContactGate::Unlocked(ContactStatus::Requesting | ContactStatus::Requested),
            ) => RelationshipStage::Pending,
            (MirrorState::Rejected, _) => RelationshipStage::Declined,
            (_, ContactGate::Unlocked(ContactStatus::Accepted)) => RelationshipStage::Accepted,
            (MirrorState::Public | MirrorState::Private, _) => {
                if self.mirror_requested {
                    RelationshipStage::Pending
                } else {
                    RelationshipStage::New
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_id_display_and_conversion() {
        let id = ProfileId::from("user_1");
        assert_eq!(id.to_string(), "user_1");
        assert_eq!(id.as_str(), "user_1");
        assert_eq!(ProfileId::from("user_1".to_string()), id);
    }

    #[test]
    fn mirror_visibility_parse() {
        assert_eq!(
            MirrorVisibility::parse("public"),
            Some(MirrorVisibility::Public)
        );
        assert_eq!(
            MirrorVisibility::parse("on_request"),
            Some(MirrorVisibility::OnRequest)
        );
        assert_eq!(
            MirrorVisibility::parse("private"),
            Some(MirrorVisibility::Private)
        );
        assert_eq!(MirrorVisibility::parse("friends"), None);
        assert_eq!(MirrorVisibility::default(), MirrorVisibility::OnRequest);
    }

    #[test]
    fn mirror_request_status_round_trip_str() {
        for status in [
            MirrorRequestStatus::Pending,
            MirrorRequestStatus::Accepted,
            MirrorRequestStatus::Rejected,
        ] {
            assert_eq!(MirrorRequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MirrorRequestStatus::parse("withdrawn"), None);
    }

    #[test]
    fn mirror_request_status_terminal() {
        assert!(!MirrorRequestStatus::Pending.is_terminal());
        assert!(MirrorRequestStatus::Accepted.is_terminal());
        assert!(MirrorRequestStatus::Rejected.is_terminal());
    }

    #[test]
    fn contact_request_status_accepts_pending_alias() {
        let status: ContactRequestStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(status, ContactRequestStatus::Requested);
        let status: ContactRequestStatus = serde_json::from_str("\"requested\"").unwrap();
        assert_eq!(status, ContactRequestStatus::Requested);
    }

    #[test]
    fn mirror_request_deserializes_without_responded_at() {
        let json = r#"{
            "sender": "u1",
            "receiver": "u2",
            "status": "pending",
            "created_at": "2024-05-01T10:00:00Z"
        }"#;
        let request: MirrorRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.status, MirrorRequestStatus::Pending);
        assert!(request.responded_at.is_none());
        assert!(request.is_between(&"u1".into(), &"u2".into()));
        assert!(!request.is_between(&"u2".into(), &"u1".into()));
    }

    #[test]
    fn contact_ack_message_defaults_to_empty() {
        let ack: ContactRequestAck = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(ack.success);
        assert!(ack.message.is_empty());
    }

    #[test]
    fn action_labels() {
        assert_eq!(MirrorAction::ViewMirror.label(), "view mirror");
        assert_eq!(MirrorAction::AwaitingResponse.label(), "awaiting response");
        assert_eq!(MirrorAction::Declined.label(), "declined");
        assert_eq!(MirrorAction::RequestAccess.label(), "request mirror access");
        assert_eq!(ContactAction::Sending.label(), "sending…");
        assert_eq!(ContactAction::RequestSent.label(), "request sent");
    }

    #[test]
    fn disabled_actions() {
        assert!(!MirrorAction::AwaitingResponse.is_enabled());
        assert!(!MirrorAction::Declined.is_enabled());
        assert!(!ContactAction::Sending.is_enabled());
        assert!(!ContactAction::RequestSent.is_enabled());
        assert!(ContactAction::RequestContact.is_enabled());
        assert!(ContactAction::StartConversation.is_enabled());
    }

    #[test]
    fn locked_gate_has_no_contact_action() {
        let state = AccessState {
            mirror: MirrorState::Private,
            contact: ContactGate::Locked,
            mirror_requested: false,
        };
        assert_eq!(state.contact_action(), None);
        assert!(!state.can_request_contact());
        assert_eq!(state.contact_status(), None);
        assert_eq!(state.stage(), RelationshipStage::New);
    }

    #[test]
    fn stage_buckets() {
        let pending = AccessState {
            mirror: MirrorState::Pending,
            contact: ContactGate::Locked,
            mirror_requested: true,
        };
        assert_eq!(pending.stage(), RelationshipStage::Pending);

        let accepted = AccessState {
            mirror: MirrorState::Accepted,
            contact: ContactGate::Unlocked(ContactStatus::Idle),
            mirror_requested: true,
        };
        assert_eq!(accepted.stage(), RelationshipStage::Accepted);

        let public_requested = AccessState {
            mirror: MirrorState::Public,
            contact: ContactGate::Unlocked(ContactStatus::Requested),
            mirror_requested: false,
        };
        assert_eq!(public_requested.stage(), RelationshipStage::Pending);

        let declined = AccessState {
            mirror: MirrorState::Rejected,
            contact: ContactGate::Locked,
            mirror_requested: true,
        };
        assert_eq!(declined.stage(), RelationshipStage::Declined);
    }
}
