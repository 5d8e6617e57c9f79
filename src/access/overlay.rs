//! Optimistic contact intents layered over server snapshots.
//!
//! When the viewer taps "request contact" the UI must reflect the intent
//! before the round-trip completes. The intent lives here, keyed by profile,
//! and never mutates the server snapshot. [`fold_contact`] merges the two.

use std::collections::HashMap;

use super::error::AccessResult;
use super::types::{ContactEvent, ContactRequestStatus, ContactStatus, ProfileId};

/// Merges a server snapshot with a local intent.
///
/// Anything the server reports wins. Without a server record, the local
/// intent (`Requesting`/`Requested`) is shown, else `Idle`.
#[must_use]
pub fn fold_contact(
    server: Option<ContactRequestStatus>,
    local: Option<ContactStatus>,
) -> ContactStatus {
    match server {
        Some(_) => ContactStatus::from_server(server),
        None => local.unwrap_or_default(),
    }
}

/// Local-only contact intents for the profiles in view.
#[derive(Debug, Clone, Default)]
pub struct ContactOverlay {
    intents: HashMap<ProfileId, ContactStatus>,
}

impl ContactOverlay {
    /// Creates an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the local intent for `profile`, if any.
    #[must_use]
    pub fn intent(&self, profile: &ProfileId) -> Option<ContactStatus> {
        self.intents.get(profile).copied()
    }

    /// Returns the effective status for `profile` given its server snapshot.
    #[must_use]
    pub fn effective(
        &self,
        profile: &ProfileId,
        server: Option<ContactRequestStatus>,
    ) -> ContactStatus {
        fold_contact(server, self.intent(profile))
    }

    /// Records a submission, moving `profile` to `Requesting`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidTransition`](super::AccessError::InvalidTransition) if the effective status is
    /// not `Idle` (a submission is in flight or already recorded).
    pub fn begin(
        &mut self,
        profile: &ProfileId,
        server: Option<ContactRequestStatus>,
    ) -> AccessResult<ContactStatus> {
        let next = self
            .effective(profile, server)
            .apply(ContactEvent::Submit)?;
        self.intents.insert(profile.clone(), next);
        Ok(next)
    }

    /// Records server confirmation, moving `profile` to `Requested`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidTransition`](super::AccessError::InvalidTransition) if no submission is in flight.
    pub fn acknowledge(&mut self, profile: &ProfileId) -> AccessResult<ContactStatus> {
        self.step(profile, ContactEvent::Acknowledged)
    }

    /// Rolls a failed submission back to `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidTransition`](super::AccessError::InvalidTransition) if no submission is in flight.
    pub fn roll_back(&mut self, profile: &ProfileId) -> AccessResult<ContactStatus> {
        let next = self.step(profile, ContactEvent::Failed)?;
        self.intents.remove(profile);
        Ok(next)
    }

    /// Drops intents the server now reports on.
    ///
    /// An acknowledged intent without a server record is kept: the refreshed
    /// snapshot may predate the submission.
    pub fn reconcile(&mut self, profile: &ProfileId, server: Option<ContactRequestStatus>) {
        if server.is_some() {
            self.intents.remove(profile);
        }
    }

    /// Forgets every intent.
    pub fn clear(&mut self) {
        self.intents.clear();
    }

    fn step(&mut self, profile: &ProfileId, event: ContactEvent) -> AccessResult<ContactStatus> {
        let current = self.intent(profile).unwrap_or_default();
        let next = current.apply(event)?;
        match next {
            ContactStatus::Requesting | ContactStatus::Requested => {
                self.intents.insert(profile.clone(), next);
            }
            ContactStatus::Idle | ContactStatus::Accepted => {}
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ProfileId {
        ProfileId::from("target")
    }

    #[test]
    fn fold_prefers_server() {
        assert_eq!(
            fold_contact(
                Some(ContactRequestStatus::Accepted),
                Some(ContactStatus::Requesting)
            ),
            ContactStatus::Accepted
        );
        assert_eq!(
            fold_contact(None, Some(ContactStatus::Requesting)),
            ContactStatus::Requesting
        );
        assert_eq!(fold_contact(None, None), ContactStatus::Idle);
    }

    #[test]
    fn optimistic_success_path() {
        let mut overlay = ContactOverlay::new();

        assert_eq!(overlay.begin(&id(), None), Ok(ContactStatus::Requesting));
        assert_eq!(overlay.effective(&id(), None), ContactStatus::Requesting);

        assert_eq!(overlay.acknowledge(&id()), Ok(ContactStatus::Requested));
        assert_eq!(overlay.effective(&id(), None), ContactStatus::Requested);
    }

    #[test]
    fn optimistic_failure_rolls_back() {
        let mut overlay = ContactOverlay::new();
        overlay.begin(&id(), None).unwrap();

        assert_eq!(overlay.roll_back(&id()), Ok(ContactStatus::Idle));
        assert_eq!(overlay.intent(&id()), None);
        assert_eq!(overlay.effective(&id(), None), ContactStatus::Idle);

        // Re-triggerable after rollback
        assert_eq!(overlay.begin(&id(), None), Ok(ContactStatus::Requesting));
    }

    #[test]
    fn begin_twice_is_rejected() {
        let mut overlay = ContactOverlay::new();
        overlay.begin(&id(), None).unwrap();
        assert!(overlay.begin(&id(), None).is_err());
    }

    #[test]
    fn begin_rejected_when_server_already_has_request() {
        let mut overlay = ContactOverlay::new();
        assert!(overlay
            .begin(&id(), Some(ContactRequestStatus::Requested))
            .is_err());
        assert_eq!(overlay.intent(&id()), None);
    }

    #[test]
    fn acknowledge_without_submission_fails() {
        let mut overlay = ContactOverlay::new();
        assert!(overlay.acknowledge(&id()).is_err());
        assert!(overlay.roll_back(&id()).is_err());
    }

    #[test]
    fn reconcile_drops_confirmed_intent() {
        let mut overlay = ContactOverlay::new();
        overlay.begin(&id(), None).unwrap();
        overlay.acknowledge(&id()).unwrap();

        overlay.reconcile(&id(), None);
        assert_eq!(overlay.intent(&id()), Some(ContactStatus::Requested));

        overlay.reconcile(&id(), Some(ContactRequestStatus::Requested));
        assert_eq!(overlay.intent(&id()), None);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut overlay = ContactOverlay::new();
        overlay.begin(&id(), None).unwrap();
        overlay.clear();
        assert_eq!(overlay.intent(&id()), None);
    }
}
