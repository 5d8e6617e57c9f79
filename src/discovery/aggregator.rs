//! Discovery feed orchestration.
//!
//! # Load Generations
//!
//! Every `load_initial` and `cancel` bumps a generation counter while holding
//! the state lock. A load remembers the generation it started under and
//! re-checks it under the same lock before applying its response, so a
//! superseded response never overwrites newer state.
//!
//! ```text
//! load_initial(F1) ── gen 1 ── fetch ─────────────────► gen != 1, discard
//! load_initial(F2) ──── gen 2 ── fetch ──► gen == 2, apply
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::error::{DiscoveryError, DiscoveryResult};
use super::keys::{AccessKey, ConnectionsKey, PageKey};
use super::merge::{apply_status_filter, assemble_feed, merge};
use super::types::{
    DiscoveryFilters, DiscoveryPage, FeedEntry, FeedSnapshot, FeedSource, LoadOutcome, Profile,
};
use crate::access::{
    AccessError, AccessRecord, AccessResult, AccessState, ContactOverlay, ContactRequestStatus,
    ContactStatus, MirrorAction, ProfileId,
};
use crate::backend::{fetch_access_record, DiscoveryBackend, RequestBackend};
use crate::cache::{CacheResult, CoalescingCache, NetworkClass, TtlPolicy};

/// The three caches backing a feed.
///
/// Clones share storage, so several aggregators (or a fresh aggregator after
/// navigation) reuse each other's loads.
#[derive(Debug, Clone)]
pub struct FeedCaches {
    /// Discovery pages.
    pub pages: CoalescingCache<PageKey, DiscoveryPage>,
    /// Connection lists.
    pub connections: CoalescingCache<ConnectionsKey, Vec<Profile>>,
    /// Request snapshots per (viewer, target) pair.
    pub access: CoalescingCache<AccessKey, AccessRecord>,
}

impl FeedCaches {
    /// Creates empty caches sharing one TTL policy.
    #[must_use]
    pub fn new(policy: TtlPolicy) -> Self {
        Self {
            pages: CoalescingCache::new(policy),
            connections: CoalescingCache::new(policy),
            access: CoalescingCache::new(policy),
        }
    }

    /// Switches every cache to `network` for subsequent stores.
    pub fn set_network_class(&self, network: NetworkClass) {
        self.pages.set_network_class(network);
        self.connections.set_network_class(network);
        self.access.set_network_class(network);
    }

    /// Drops everything cached for `viewer`. Returns the number of keys removed.
    pub fn invalidate_viewer(&self, viewer: &ProfileId) -> usize {
        let pages = self.pages.invalidate_where(|k| &k.viewer == viewer);
        let connections = usize::from(self.connections.invalidate(&ConnectionsKey::new(viewer)));
        let access = self.access.invalidate_where(|k| &k.viewer == viewer);
        pages + connections + access
    }

    /// Drops everything.
    pub fn clear(&self) {
        self.pages.clear();
        self.connections.clear();
        self.access.clear();
    }
}

#[derive(Debug, Default)]
struct FeedState {
    filters: Option<DiscoveryFilters>,
    discoverable: Vec<Profile>,
    connections: Vec<Profile>,
    records: HashMap<ProfileId, AccessRecord>,
    overlay: ContactOverlay,
    has_more: bool,
    loading: bool,
    degraded: Vec<FeedSource>,
}

impl FeedState {
    fn entries(&self, viewer: &ProfileId) -> Vec<FeedEntry> {
        let profiles = merge(&self.discoverable, &self.connections);
        let feed = assemble_feed(viewer, profiles, &self.records, &self.overlay);
        let filter = self
            .filters
            .as_ref()
            .map(|f| f.status_filter)
            .unwrap_or_default();
        apply_status_filter(feed, filter)
    }

    fn access_for(&self, viewer: &ProfileId, target: &ProfileId) -> Option<AccessState> {
        let profile = merge(&self.discoverable, &self.connections)
            .into_iter()
            .find(|p| &p.id == target)?;
        assemble_feed(viewer, vec![profile], &self.records, &self.overlay)
            .pop()
            .map(|entry| entry.access)
    }

    fn server_contact(&self, target: &ProfileId) -> Option<ContactRequestStatus> {
        self.records
            .get(target)
            .and_then(|r| r.contact_request.as_ref())
            .map(|c| c.status)
    }

    /// Replaces snapshots and drops local intents the server now reports on.
    fn store_records(&mut self, records: HashMap<ProfileId, AccessRecord>) {
        for (id, record) in records {
            let server = record.contact_request.as_ref().map(|c| c.status);
            self.overlay.reconcile(&id, server);
            self.records.insert(id, record);
        }
    }
}

/// Builds and paginates one viewer's discovery feed.
///
/// Holds the merged feed state; the caches behind it may be shared.
pub struct DiscoveryAggregator<B> {
    viewer: ProfileId,
    backend: Arc<B>,
    caches: FeedCaches,
    generation: AtomicU64,
    state: RwLock<FeedState>,
}

impl<B> fmt::Debug for DiscoveryAggregator<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryAggregator")
            .field("viewer", &self.viewer)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<B> DiscoveryAggregator<B>
where
    B: DiscoveryBackend + RequestBackend + 'static,
{
    /// Creates an empty feed for `viewer`.
    #[must_use]
    pub fn new(viewer: impl Into<ProfileId>, backend: Arc<B>, caches: FeedCaches) -> Self {
        Self {
            viewer: viewer.into(),
            backend,
            caches,
            generation: AtomicU64::new(0),
            state: RwLock::new(FeedState::default()),
        }
    }

    /// Returns the viewer this feed belongs to.
    #[must_use]
    pub const fn viewer(&self) -> &ProfileId {
        &self.viewer
    }

    /// Returns the caches backing this feed.
    #[must_use]
    pub const fn caches(&self) -> &FeedCaches {
        &self.caches
    }

    /// Replaces the feed with the first page for `filters` plus connections.
    ///
    /// Changing any filter, including the status filter, goes through here.
    /// Pages of an unchanged query come from cache.
    ///
    /// If one source fails the feed renders the other and the failure is
    /// listed in [`FeedSnapshot::degraded`].
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidFilters`] for invalid filters, or
    /// [`DiscoveryError::Unavailable`] if both sources fail.
    pub async fn load_initial(&self, filters: DiscoveryFilters) -> DiscoveryResult<LoadOutcome> {
        filters.validate()?;

        let generation = {
            let mut state = self.state.write().await;
            state.filters = Some(filters.clone());
            state.loading = true;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        info!(
            viewer = %self.viewer,
            generation,
            signature = %filters.signature(),
            "Loading discovery feed"
        );

        let first_page = filters.at_offset(0);
        let (page, connections) =
            tokio::join!(self.fetch_page(&first_page), self.fetch_connections());

        if !self.is_current(generation) {
            debug!(generation, "Discarding superseded feed load");
            return Ok(LoadOutcome::Superseded);
        }

        let mut degraded = Vec::new();
        let mut failures = Vec::new();

        let (discoverable, has_more) = match page {
            Ok(page) => (page.profiles, page.has_more),
            Err(e) => {
                warn!(viewer = %self.viewer, error = %e, "Discovery query failed");
                failures.push(format!("discoverable: {e}"));
                degraded.push(FeedSource::Discoverable);
                (Vec::new(), false)
            }
        };
        let connections = match connections {
            Ok(connections) => connections,
            Err(e) => {
                warn!(viewer = %self.viewer, error = %e, "Connections query failed");
                failures.push(format!("connections: {e}"));
                degraded.push(FeedSource::Connections);
                Vec::new()
            }
        };

        if degraded.len() == 2 {
            let mut state = self.state.write().await;
            // The filters already switched; the old result set no longer applies
            if self.is_current(generation) {
                state.discoverable.clear();
                state.connections.clear();
                state.records.clear();
                state.has_more = false;
                state.loading = false;
                state.degraded = degraded;
            }
            return Err(DiscoveryError::Unavailable(failures.join("; ")));
        }

        let ids: Vec<ProfileId> = merge(&discoverable, &connections)
            .into_iter()
            .map(|p| p.id)
            .collect();
        let records = self.fetch_records(&ids).await;

        let mut state = self.state.write().await;
        if !self.is_current(generation) {
            debug!(generation, "Discarding superseded feed load");
            return Ok(LoadOutcome::Superseded);
        }

        let loaded = discoverable.len();
        state.discoverable = discoverable;
        state.connections = connections;
        state.records.clear();
        state.store_records(records);
        state.has_more = has_more;
        state.loading = false;
        state.degraded = degraded;
        drop(state);

        info!(viewer = %self.viewer, loaded, has_more, "Discovery feed loaded");
        Ok(LoadOutcome::Applied { loaded, has_more })
    }

    /// Appends the next discovery page.
    ///
    /// Does nothing and returns [`LoadOutcome::Skipped`] when a load is in
    /// flight, no more pages exist, or no initial load has happened.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Cache`] if the page load fails. The feed
    /// keeps its current entries and the call may be retried.
    pub async fn load_more(&self) -> DiscoveryResult<LoadOutcome> {
        let (generation, filters) = {
            let mut state = self.state.write().await;
            if state.loading || !state.has_more {
                debug!(
                    loading = state.loading,
                    has_more = state.has_more,
                    "Skipping load_more"
                );
                return Ok(LoadOutcome::Skipped);
            }
            let offset = u32::try_from(state.discoverable.len()).unwrap_or(u32::MAX);
            let Some(next) = state.filters.as_ref().map(|f| f.at_offset(offset)) else {
                return Ok(LoadOutcome::Skipped);
            };
            state.loading = true;
            (self.generation.load(Ordering::SeqCst), next)
        };
        debug!(viewer = %self.viewer, offset = filters.offset, "Loading next discovery page");

        let page = match self.fetch_page(&filters).await {
            Ok(page) => page,
            Err(e) => {
                let mut state = self.state.write().await;
                if self.is_current(generation) {
                    state.loading = false;
                }
                warn!(viewer = %self.viewer, error = %e, "Next page failed");
                return Err(e.into());
            }
        };

        if !self.is_current(generation) {
            return Ok(LoadOutcome::Superseded);
        }

        let new_ids: Vec<ProfileId> = {
            let state = self.state.read().await;
            page.profiles
                .iter()
                .filter(|p| !state.records.contains_key(&p.id))
                .map(|p| p.id.clone())
                .collect()
        };
        let records = self.fetch_records(&new_ids).await;

        let mut state = self.state.write().await;
        if !self.is_current(generation) {
            debug!(generation, "Discarding superseded page");
            return Ok(LoadOutcome::Superseded);
        }

        let loaded = page.profiles.len();
        state.discoverable.extend(page.profiles);
        state.store_records(records);
        state.has_more = page.has_more;
        state.loading = false;

        Ok(LoadOutcome::Applied {
            loaded,
            has_more: page.has_more,
        })
    }

    /// Drops cached data for this viewer and reloads with the current filters.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load_initial`].
    pub async fn refresh(&self) -> DiscoveryResult<LoadOutcome> {
        let Some(filters) = self.state.read().await.filters.clone() else {
            return Ok(LoadOutcome::Skipped);
        };
        let dropped = self.caches.invalidate_viewer(&self.viewer);
        debug!(viewer = %self.viewer, dropped, "Invalidated cached feed data");
        self.load_initial(filters).await
    }

    /// Stops listening to in-flight loads; their responses are discarded.
    ///
    /// The underlying fetches still complete and populate the cache.
    pub async fn cancel(&self) {
        let mut state = self.state.write().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        state.loading = false;
        debug!(viewer = %self.viewer, generation, "Cancelled feed loads");
    }

    /// Cancels loads and forgets the feed, including local contact intents.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *state = FeedState::default();
    }

    /// Returns the feed after the status filter.
    pub async fn entries(&self) -> Vec<FeedEntry> {
        self.state.read().await.entries(&self.viewer)
    }

    /// Returns a consistent snapshot of the feed.
    pub async fn snapshot(&self) -> FeedSnapshot {
        let state = self.state.read().await;
        FeedSnapshot {
            entries: state.entries(&self.viewer),
            has_more: state.has_more,
            loading: state.loading,
            degraded: state.degraded.clone(),
        }
    }

    /// Returns whether more discoverable pages exist.
    pub async fn has_more(&self) -> bool {
        self.state.read().await.has_more
    }

    /// Returns whether a load is in flight.
    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Returns the filters of the current feed.
    pub async fn filters(&self) -> Option<DiscoveryFilters> {
        self.state.read().await.filters.clone()
    }

    /// Returns the access state for `target`, ignoring the status filter.
    pub async fn access_state(&self, target: &ProfileId) -> Option<AccessState> {
        self.state.read().await.access_for(&self.viewer, target)
    }

    /// Asks `target` for mirror access.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if `target` is not in the feed,
    /// [`AccessError::MirrorUnavailable`] unless the mirror is private, or
    /// [`AccessError::Backend`] if the request endpoint fails.
    pub async fn request_mirror(&self, target: &ProfileId) -> DiscoveryResult<AccessState> {
        let access = self.require_access(target).await?;
        if access.mirror_action() != MirrorAction::RequestAccess {
            return Err(AccessError::MirrorUnavailable(access.mirror).into());
        }

        info!(viewer = %self.viewer, profile = %target, "Sending mirror request");
        let request = self
            .backend
            .create_mirror_request(&self.viewer, target)
            .await
            .map_err(|e| {
                warn!(profile = %target, error = %e, "Mirror request failed");
                AccessError::from(e)
            })?;
        self.caches.access.invalidate(&AccessKey::new(&self.viewer, target));

        let mut state = self.state.write().await;
        let mut record = state.records.get(target).cloned().unwrap_or_default();
        record.mirror_requests.push(request);
        state.records.insert(target.clone(), record);
        state
            .access_for(&self.viewer, target)
            .ok_or_else(|| DiscoveryError::NotFound(target.to_string()))
    }

    /// Asks `target` for direct contact.
    ///
    /// The gate is checked before any network call. The feed shows
    /// `Requesting` while the call is in flight, then `Requested` on success
    /// or `Idle` on failure.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if `target` is not in the feed,
    /// [`AccessError::ContactLocked`] if mirror access is not established,
    /// [`AccessError::InvalidTransition`] if a request already exists,
    /// [`AccessError::Rejected`] if the server declines, or
    /// [`AccessError::Backend`] if the endpoint fails.
    pub async fn request_contact(&self, target: &ProfileId) -> DiscoveryResult<AccessState> {
        {
            let mut state = self.state.write().await;
            let access = state
                .access_for(&self.viewer, target)
                .ok_or_else(|| DiscoveryError::NotFound(target.to_string()))?;
            if !access.can_request_contact() {
                warn!(
                    profile = %target,
                    mirror = access.mirror.as_str(),
                    "Contact request blocked by mirror gate"
                );
                return Err(AccessError::ContactLocked(access.mirror).into());
            }
            let server = state.server_contact(target);
            state.overlay.begin(target, server)?;
        }

        info!(viewer = %self.viewer, profile = %target, "Sending contact request");
        let result = self
            .backend
            .create_contact_request(&self.viewer, target)
            .await;

        let mut state = self.state.write().await;
        let outcome = match result {
            Ok(ack) if ack.success => {
                settle_intent(target, state.overlay.acknowledge(target));
                self.caches.access.invalidate(&AccessKey::new(&self.viewer, target));
                Ok(())
            }
            Ok(ack) => {
                settle_intent(target, state.overlay.roll_back(target));
                warn!(profile = %target, message = %ack.message, "Contact request declined");
                Err(AccessError::Rejected(ack.message))
            }
            Err(e) => {
                settle_intent(target, state.overlay.roll_back(target));
                warn!(profile = %target, error = %e, "Contact request failed");
                Err(AccessError::Backend(e))
            }
        };
        outcome?;

        state
            .access_for(&self.viewer, target)
            .ok_or_else(|| DiscoveryError::NotFound(target.to_string()))
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn require_access(&self, target: &ProfileId) -> DiscoveryResult<AccessState> {
        self.access_state(target)
            .await
            .ok_or_else(|| DiscoveryError::NotFound(target.to_string()))
    }

    async fn fetch_page(&self, filters: &DiscoveryFilters) -> CacheResult<DiscoveryPage> {
        let backend = Arc::clone(&self.backend);
        let viewer = self.viewer.clone();
        let query = filters.clone();
        self.caches
            .pages
            .get_or_load(
                PageKey::new(&self.viewer, filters),
                move || async move { backend.discover(&viewer, &query).await },
                None,
            )
            .await
    }

    async fn fetch_connections(&self) -> CacheResult<Vec<Profile>> {
        let backend = Arc::clone(&self.backend);
        let viewer = self.viewer.clone();
        self.caches
            .connections
            .get_or_load(
                ConnectionsKey::new(&self.viewer),
                move || async move { backend.connections(&viewer).await },
                None,
            )
            .await
    }

    /// Loads request snapshots concurrently. Failed loads are left out, which
    /// evaluates those profiles as if no request exists.
    async fn fetch_records(&self, ids: &[ProfileId]) -> HashMap<ProfileId, AccessRecord> {
        let loads = ids.iter().map(|id| async move {
            let backend = Arc::clone(&self.backend);
            let viewer = self.viewer.clone();
            let target = id.clone();
            let result = self
                .caches
                .access
                .get_or_load(
                    AccessKey::new(&self.viewer, id),
                    move || async move {
                        fetch_access_record(backend.as_ref(), &viewer, &target).await
                    },
                    None,
                )
                .await;
            (id, result)
        });

        let mut records = HashMap::with_capacity(ids.len());
        for (id, result) in join_all(loads).await {
            match result {
                Ok(record) => {
                    records.insert(id.clone(), record);
                }
                Err(e) => {
                    warn!(profile = %id, error = %e, "Access record unavailable");
                }
            }
        }
        records
    }
}

/// Logs overlay transitions that no longer apply (the feed was reset while
/// the request was in flight).
fn settle_intent(target: &ProfileId, result: AccessResult<ContactStatus>) {
    if let Err(e) = result {
        debug!(profile = %target, error = %e, "Contact intent already cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalidate_viewer_only_touches_that_viewer() {
        let caches = FeedCaches::new(TtlPolicy::default());
        let alice = ProfileId::from("alice");
        let bob = ProfileId::from("bob");
        let page = DiscoveryPage {
            profiles: Vec::new(),
            has_more: false,
        };

        let filters = DiscoveryFilters::default();
        caches
            .pages
            .insert(PageKey::new(&alice, &filters), page.clone(), None);
        caches.pages.insert(PageKey::new(&bob, &filters), page, None);
        caches
            .connections
            .insert(ConnectionsKey::new(&alice), Vec::new(), None);
        caches.access.insert(
            AccessKey::new(&alice, &bob),
            AccessRecord::default(),
            None,
        );

        assert_eq!(caches.invalidate_viewer(&alice), 3);
        assert!(caches.pages.get(&PageKey::new(&bob, &filters)).is_some());
        assert!(caches.pages.get(&PageKey::new(&alice, &filters)).is_none());
    }

    #[tokio::test]
    async fn invalidate_viewer_matches_whole_viewer_id() {
        let caches = FeedCaches::new(TtlPolicy::default());
        let short = ProfileId::from("a");
        let long = ProfileId::from("a:x");
        let target = ProfileId::from("t");
        let filters = DiscoveryFilters::default();
        let page = DiscoveryPage {
            profiles: Vec::new(),
            has_more: false,
        };

        caches.pages.insert(PageKey::new(&long, &filters), page, None);
        caches
            .access
            .insert(AccessKey::new(&long, &target), AccessRecord::default(), None);

        assert_eq!(caches.invalidate_viewer(&short), 0);
        assert!(caches.pages.get(&PageKey::new(&long, &filters)).is_some());
        assert!(caches.access.get(&AccessKey::new(&long, &target)).is_some());
    }

    #[tokio::test]
    async fn set_network_class_applies_to_all_caches() {
        let caches = FeedCaches::new(TtlPolicy::default());
        caches.set_network_class(NetworkClass::Constrained);
        assert_eq!(caches.pages.network_class(), NetworkClass::Constrained);
        assert_eq!(caches.connections.network_class(), NetworkClass::Constrained);
        assert_eq!(caches.access.network_class(), NetworkClass::Constrained);
    }
}
