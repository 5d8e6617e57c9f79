//! Consent gate for mirrors and direct contact.
//!
//! This module decides, for every profile in the feed, what the viewer may
//! see and do. It is a two-stage gate:
//!
//! 1. **Mirror**: the AI-generated profile is visible once a mirror request
//!    is accepted (or the owner made it public).
//! 2. **Contact**: a contact request may only be issued once the mirror is
//!    visible; messaging unlocks when the receiver accepts.
//!
//! # Architecture
//!
//! ```text
//! AccessRecord (server snapshot) ─┐
//! ContactOverlay (local intent) ──┼──► machine::evaluate ──► AccessState
//! Profile (visibility, connected) ┘                            ├── mirror_action()
//!                                                              └── contact_action()
//! ```
//!
//! The client-side check is advisory. The server must independently verify
//! that mirror access precedes any contact request.

mod error;
pub mod machine;
mod overlay;
pub mod types;

pub use error::{AccessError, AccessResult};
pub use machine::{can_request_contact, contact_gate, evaluate, mirror_state, AccessInputs};
pub use overlay::{fold_contact, ContactOverlay};
pub use types::{
    AccessRecord, AccessState, ContactAction, ContactEvent, ContactGate, ContactRequest,
    ContactRequestAck, ContactRequestStatus, ContactStatus, MirrorAction, MirrorRequest,
    MirrorRequestStatus, MirrorState, MirrorVisibility, ProfileId, RelationshipStage,
};
