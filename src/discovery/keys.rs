//! Cache key definitions for the feed caches.
//!
//! Keys are structured so ids containing `:` never collide; the `Display`
//! form is only used in logs.

use std::fmt;

use super::types::DiscoveryFilters;
use crate::access::ProfileId;

/// Cache key for one discovery page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    /// Viewer the page was queried for
    pub viewer: ProfileId,
    /// Filter signature, see [`DiscoveryFilters::signature`]
    pub signature: String,
    /// Offset of the page's first profile
    pub offset: u32,
}

impl PageKey {
    /// Creates the key for `filters` as seen by `viewer`.
    #[must_use]
    pub fn new(viewer: &ProfileId, filters: &DiscoveryFilters) -> Self {
        Self {
            viewer: viewer.clone(),
            signature: filters.signature(),
            offset: filters.offset,
        }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "discover:{}:{}:{}",
            self.viewer, self.signature, self.offset
        )
    }
}

/// Cache key for a viewer's connections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionsKey {
    /// Viewer owning the connections
    pub viewer: ProfileId,
}

impl ConnectionsKey {
    /// Creates the key for `viewer`.
    #[must_use]
    pub fn new(viewer: &ProfileId) -> Self {
        Self {
            viewer: viewer.clone(),
        }
    }
}

impl fmt::Display for ConnectionsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connections:{}", self.viewer)
    }
}

/// Cache key for the request snapshots between a viewer and a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessKey {
    /// Requesting side
    pub viewer: ProfileId,
    /// Profile being viewed
    pub target: ProfileId,
}

impl AccessKey {
    /// Creates the key for the (`viewer`, `target`) pair.
    #[must_use]
    pub fn new(viewer: &ProfileId, target: &ProfileId) -> Self {
        Self {
            viewer: viewer.clone(),
            target: target.clone(),
        }
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "access:{}:{}", self.viewer, self.target)
    }
}
