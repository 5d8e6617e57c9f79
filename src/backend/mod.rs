//! External collaborators consumed by the core.
//!
//! The core owns no storage and no transport. Everything it reads or writes
//! goes through the traits here, which the host implements on top of its
//! HTTP client. Timeouts are the implementation's responsibility.
//!
//! | Trait | Endpoints |
//! |-------|-----------|
//! | [`DiscoveryBackend`] | discovery query, connections query |
//! | [`RequestBackend`] | mirror request create/read, contact request create/read |

mod error;

use async_trait::async_trait;

pub use error::{BackendError, BackendResult};

use crate::access::{
    AccessRecord, ContactRequest, ContactRequestAck, MirrorRequest, ProfileId,
};
use crate::discovery::{DiscoveryFilters, DiscoveryPage, Profile};

/// Profile queries.
#[async_trait]
pub trait DiscoveryBackend: Send + Sync {
    /// Returns one page of discoverable profiles for `filters`.
    async fn discover(
        &self,
        viewer: &ProfileId,
        filters: &DiscoveryFilters,
    ) -> BackendResult<DiscoveryPage>;

    /// Returns every profile with an accepted mirror relationship.
    async fn connections(&self, viewer: &ProfileId) -> BackendResult<Vec<Profile>>;
}

/// Mirror and contact request endpoints.
#[async_trait]
pub trait RequestBackend: Send + Sync {
    /// Creates a mirror request from `viewer` to `receiver`.
    async fn create_mirror_request(
        &self,
        viewer: &ProfileId,
        receiver: &ProfileId,
    ) -> BackendResult<MirrorRequest>;

    /// Reads mirror requests from `sender` to `receiver`.
    async fn mirror_requests(
        &self,
        sender: &ProfileId,
        receiver: &ProfileId,
    ) -> BackendResult<Vec<MirrorRequest>>;

    /// Creates a contact request from `viewer` to `receiver`.
    async fn create_contact_request(
        &self,
        viewer: &ProfileId,
        receiver: &ProfileId,
    ) -> BackendResult<ContactRequestAck>;

    /// Reads the contact request from `sender` to `receiver`, if any.
    async fn contact_request(
        &self,
        sender: &ProfileId,
        receiver: &ProfileId,
    ) -> BackendResult<Option<ContactRequest>>;
}

/// Reads both request snapshots for one (viewer, target) pair concurrently.
///
/// # Errors
///
/// Returns the first endpoint error.
pub async fn fetch_access_record<B>(
    backend: &B,
    viewer: &ProfileId,
    target: &ProfileId,
) -> BackendResult<AccessRecord>
where
    B: RequestBackend + ?Sized,
{
    let (mirror_requests, contact_request) = futures::try_join!(
        backend.mirror_requests(viewer, target),
        backend.contact_request(viewer, target),
    )?;

    Ok(AccessRecord {
        mirror_requests,
        contact_request,
    })
}
