//! Pure feed assembly.
//!
//! ```text
//! connections ──┐
//!               ├── merge ──► profiles ──► assemble_feed ──► apply_status_filter
//! discoverable ─┘                ▲
//!                 access records ┘ + contact overlay
//! ```
//!
//! Nothing here keeps state; the aggregator re-runs the whole pipeline on
//! every read.

use std::collections::HashMap;

use super::types::{FeedEntry, Profile, StatusFilter};
use crate::access::{evaluate, AccessInputs, AccessRecord, ContactOverlay, ProfileId};

/// Merges discoverable profiles with connections, one entry per profile id.
///
/// Connections come first, then discoverable profiles in server order.
/// When a profile is in both sources the connection record keeps its identity
/// fields, and empty or absent fields fall back to the discoverable snippet.
/// Repeated ids within one source keep the first occurrence.
///
/// `merge(&merge(a, b), &[]) == merge(a, b)`.
#[must_use]
pub fn merge(discoverable: &[Profile], connections: &[Profile]) -> Vec<Profile> {
    let mut order: Vec<ProfileId> = Vec::with_capacity(discoverable.len() + connections.len());
    let mut by_id: HashMap<ProfileId, Profile> = HashMap::with_capacity(order.capacity());

    for connection in connections {
        if by_id.contains_key(&connection.id) {
            continue;
        }
        let mut profile = connection.clone();
        profile.connected = true;
        order.push(profile.id.clone());
        by_id.insert(profile.id.clone(), profile);
    }

    for snippet in discoverable {
        match by_id.get_mut(&snippet.id) {
            Some(existing) => fill_missing(existing, snippet),
            None => {
                order.push(snippet.id.clone());
                by_id.insert(snippet.id.clone(), snippet.clone());
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect()
}

fn fill_missing(record: &mut Profile, snippet: &Profile) {
    if record.photos.is_empty() && !snippet.photos.is_empty() {
        record.photos.clone_from(&snippet.photos);
    }
    if record.snapshot_id.is_none() {
        record.snapshot_id.clone_from(&snippet.snapshot_id);
    }
    if record.bio.is_none() {
        record.bio.clone_from(&snippet.bio);
    }
    record.age = record.age.or(snippet.age);
    record.gender = record.gender.or(snippet.gender);
    record.distance_km = record.distance_km.or(snippet.distance_km);
    record.connected |= snippet.connected;
}

/// Evaluates access for every profile.
///
/// Profiles without a fetched record are evaluated as if no request exists.
#[must_use]
pub fn assemble_feed(
    viewer: &ProfileId,
    profiles: Vec<Profile>,
    records: &HashMap<ProfileId, AccessRecord>,
    overlay: &ContactOverlay,
) -> Vec<FeedEntry> {
    profiles
        .into_iter()
        .map(|profile| {
            let record = records.get(&profile.id);
            let server = record
                .and_then(|r| r.contact_request.as_ref())
                .map(|c| c.status);
            let access = evaluate(&AccessInputs {
                viewer,
                target: &profile.id,
                connected: profile.connected,
                visibility: profile.mirror_visibility,
                mirror_requests: record
                    .map(|r| r.mirror_requests.as_slice())
                    .unwrap_or_default(),
                contact: overlay.effective(&profile.id, server),
            });
            FeedEntry { profile, access }
        })
        .collect()
}

/// Narrows the feed to entries whose relationship stage matches `filter`.
#[must_use]
pub fn apply_status_filter(entries: Vec<FeedEntry>, filter: StatusFilter) -> Vec<FeedEntry> {
    if filter == StatusFilter::All {
        return entries;
    }
    entries
        .into_iter()
        .filter(|entry| filter.matches(entry.access.stage()))
        .collect()
}
