//! Reusable test helpers for feed and cache integration tests.
//!
//! `MockBackend` implements both backend traits over in-memory data. Every
//! endpoint counts its calls. Discovery and contact submissions can be held
//! open with a gate, and any endpoint can be made to fail.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::watch;

use mirror_core::access::{
    ContactRequest, ContactRequestAck, ContactRequestStatus, MirrorRequest, MirrorRequestStatus,
    MirrorVisibility, ProfileId,
};
use mirror_core::backend::{BackendError, BackendResult, DiscoveryBackend, RequestBackend};
use mirror_core::discovery::{DiscoveryFilters, DiscoveryPage, Profile};

/// Viewer used throughout the integration tests.
pub const VIEWER: &str = "viewer";

/// Creates a profile with the given id and visibility.
pub fn profile(id: &str, visibility: MirrorVisibility) -> Profile {
    let mut p = Profile::new(id, format!("User {id}"));
    p.mirror_visibility = visibility;
    p
}

/// Creates `count` on-request profiles named `{prefix}{n}`.
pub fn profiles(prefix: &str, count: usize) -> Vec<Profile> {
    (0..count)
        .map(|n| profile(&format!("{prefix}{n}"), MirrorVisibility::OnRequest))
        .collect()
}

/// Creates a mirror request snapshot from [`VIEWER`] to `receiver`.
pub fn mirror_request(receiver: &str, status: MirrorRequestStatus, minute: u32) -> MirrorRequest {
    MirrorRequest {
        sender: VIEWER.into(),
        receiver: receiver.into(),
        status,
        created_at: Utc
            .with_ymd_and_hms(2024, 6, 1, 9, minute, 0)
            .single()
            .expect("valid timestamp"),
        responded_at: None,
    }
}

/// Creates a contact request snapshot from [`VIEWER`] to `receiver`.
pub fn contact_request(receiver: &str, status: ContactRequestStatus) -> ContactRequest {
    ContactRequest {
        sender: VIEWER.into(),
        receiver: receiver.into(),
        status,
        created_at: Utc::now(),
    }
}

/// Waits until `counter` reaches `n`, yielding to other tasks.
///
/// # Panics
///
/// Panics if the count is not reached within one second.
pub async fn wait_for_calls(counter: &AtomicUsize, n: usize) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while counter.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("expected call count not reached");
}

/// Opens a gate created with `hold_*`.
pub fn release(gate: &watch::Sender<bool>) {
    gate.send_replace(true);
}

async fn pass(gate: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = gate {
        let _ = rx.wait_for(|open| *open).await;
    }
}

/// In-memory backend with call counters.
#[derive(Default)]
pub struct MockBackend {
    discoverable: Mutex<Vec<Profile>>,
    discoverable_by_signature: Mutex<HashMap<String, Vec<Profile>>>,
    connections: Mutex<Vec<Profile>>,
    mirror_requests: Mutex<Vec<MirrorRequest>>,
    contact_requests: Mutex<Vec<ContactRequest>>,
    discover_gates: Mutex<HashMap<String, watch::Receiver<bool>>>,
    contact_gate: Mutex<Option<watch::Receiver<bool>>>,
    contact_rejection: Mutex<Option<String>>,

    pub fail_discover: AtomicBool,
    pub fail_connections: AtomicBool,
    pub fail_access: AtomicBool,
    pub fail_contact: AtomicBool,
    pub fail_mirror: AtomicBool,

    pub discover_calls: AtomicUsize,
    pub connections_calls: AtomicUsize,
    pub mirror_read_calls: AtomicUsize,
    pub contact_read_calls: AtomicUsize,
    pub create_mirror_calls: AtomicUsize,
    pub create_contact_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sets the profiles returned by discovery for any query.
    pub fn set_discoverable(&self, profiles: Vec<Profile>) {
        *self.discoverable.lock().unwrap() = profiles;
    }

    /// Sets the profiles returned for one query signature.
    pub fn set_discoverable_for(&self, filters: &DiscoveryFilters, profiles: Vec<Profile>) {
        self.discoverable_by_signature
            .lock()
            .unwrap()
            .insert(filters.signature(), profiles);
    }

    pub fn set_connections(&self, profiles: Vec<Profile>) {
        *self.connections.lock().unwrap() = profiles;
    }

    /// Replaces the mirror request snapshots (a server-side status change).
    pub fn set_mirror_requests(&self, requests: Vec<MirrorRequest>) {
        *self.mirror_requests.lock().unwrap() = requests;
    }

    pub fn set_contact_requests(&self, requests: Vec<ContactRequest>) {
        *self.contact_requests.lock().unwrap() = requests;
    }

    /// Makes contact submissions return `success: false` with `message`.
    pub fn reject_contact_requests(&self, message: &str) {
        *self.contact_rejection.lock().unwrap() = Some(message.to_string());
    }

    /// Holds discovery calls for `filters` until the returned gate is released.
    pub fn hold_discover(&self, filters: &DiscoveryFilters) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        self.discover_gates
            .lock()
            .unwrap()
            .insert(filters.signature(), rx);
        tx
    }

    /// Holds contact submissions until the returned gate is released.
    pub fn hold_contact_requests(&self) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        *self.contact_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiscoveryBackend for MockBackend {
    async fn discover(
        &self,
        _viewer: &ProfileId,
        filters: &DiscoveryFilters,
    ) -> BackendResult<DiscoveryPage> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self
            .discover_gates
            .lock()
            .unwrap()
            .get(&filters.signature())
            .cloned();
        pass(gate).await;

        if self.fail_discover.load(Ordering::SeqCst) {
            return Err(BackendError::Network("discovery timed out".to_string()));
        }

        let universe = self
            .discoverable_by_signature
            .lock()
            .unwrap()
            .get(&filters.signature())
            .cloned()
            .unwrap_or_else(|| self.discoverable.lock().unwrap().clone());

        let start = (filters.offset as usize).min(universe.len());
        let end = (start + filters.limit as usize).min(universe.len());
        Ok(DiscoveryPage {
            profiles: universe[start..end].to_vec(),
            has_more: end < universe.len(),
        })
    }

    async fn connections(&self, _viewer: &ProfileId) -> BackendResult<Vec<Profile>> {
        self.connections_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_connections.load(Ordering::SeqCst) {
            return Err(BackendError::Network("connections timed out".to_string()));
        }
        Ok(self.connections.lock().unwrap().clone())
    }
}

#[async_trait]
impl RequestBackend for MockBackend {
    async fn create_mirror_request(
        &self,
        viewer: &ProfileId,
        receiver: &ProfileId,
    ) -> BackendResult<MirrorRequest> {
        self.create_mirror_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_mirror.load(Ordering::SeqCst) {
            return Err(BackendError::Network("connection reset".to_string()));
        }
        let request = MirrorRequest {
            sender: viewer.clone(),
            receiver: receiver.clone(),
            status: MirrorRequestStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
        };
        self.mirror_requests.lock().unwrap().push(request.clone());
        Ok(request)
    }

    async fn mirror_requests(
        &self,
        sender: &ProfileId,
        receiver: &ProfileId,
    ) -> BackendResult<Vec<MirrorRequest>> {
        self.mirror_read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_access.load(Ordering::SeqCst) {
            return Err(BackendError::Network("request lookup failed".to_string()));
        }
        Ok(self
            .mirror_requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_between(sender, receiver))
            .cloned()
            .collect())
    }

    async fn create_contact_request(
        &self,
        viewer: &ProfileId,
        receiver: &ProfileId,
    ) -> BackendResult<ContactRequestAck> {
        self.create_contact_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.contact_gate.lock().unwrap().clone();
        pass(gate).await;

        if self.fail_contact.load(Ordering::SeqCst) {
            return Err(BackendError::Network("connection reset".to_string()));
        }
        let rejection = self.contact_rejection.lock().unwrap().clone();
        if let Some(message) = rejection {
            return Ok(ContactRequestAck {
                success: false,
                message,
            });
        }
        self.contact_requests.lock().unwrap().push(ContactRequest {
            sender: viewer.clone(),
            receiver: receiver.clone(),
            status: ContactRequestStatus::Requested,
            created_at: Utc::now(),
        });
        Ok(ContactRequestAck {
            success: true,
            message: "Contact request sent".to_string(),
        })
    }

    async fn contact_request(
        &self,
        sender: &ProfileId,
        receiver: &ProfileId,
    ) -> BackendResult<Option<ContactRequest>> {
        self.contact_read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_access.load(Ordering::SeqCst) {
            return Err(BackendError::Network("request lookup failed".to_string()));
        }
        Ok(self
            .contact_requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| &r.sender == sender && &r.receiver == receiver)
            .cloned())
    }
}
