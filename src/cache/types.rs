//! Types for the coalescing cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Network/device classification used to pick a cache TTL.
///
/// The classification is supplied by the host (viewport size, connection
/// API, ...). A constrained device keeps values longer so that flaky
/// connections cause fewer reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkClass {
    /// Desktop-class device on a stable connection.
    #[default]
    Normal,
    /// Mobile or otherwise constrained device.
    Constrained,
}

impl NetworkClass {
    /// Classifies from a boolean "is constrained" hint.
    #[must_use]
    pub const fn from_constrained(constrained: bool) -> Self {
        if constrained {
            Self::Constrained
        } else {
            Self::Normal
        }
    }

    /// Converts to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Constrained => "constrained",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "constrained" => Some(Self::Constrained),
            _ => None,
        }
    }
}

/// TTL selection policy injected into a cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    /// TTL used on [`NetworkClass::Normal`].
    pub normal: Duration,
    /// TTL used on [`NetworkClass::Constrained`].
    pub constrained: Duration,
}

impl TtlPolicy {
    /// Default TTL for normal devices (5 minutes).
    pub const DEFAULT_NORMAL: Duration = Duration::from_secs(5 * 60);

    /// Default TTL for constrained devices (15 minutes).
    pub const DEFAULT_CONSTRAINED: Duration = Duration::from_secs(15 * 60);

    /// Creates a policy with distinct TTLs per network class.
    #[must_use]
    pub const fn new(normal: Duration, constrained: Duration) -> Self {
        Self {
            normal,
            constrained,
        }
    }

    /// Creates a policy that uses the same TTL regardless of network class.
    #[must_use]
    pub const fn uniform(ttl: Duration) -> Self {
        Self::new(ttl, ttl)
    }

    /// Returns the TTL for the given network class.
    #[must_use]
    pub const fn ttl_for(&self, class: NetworkClass) -> Duration {
        match class {
            NetworkClass::Normal => self.normal,
            NetworkClass::Constrained => self.constrained,
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NORMAL, Self::DEFAULT_CONSTRAINED)
    }
}

/// A stored value with its freshness metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    /// Cache key.
    pub key: K,
    /// Cached value.
    pub value: V,
    /// When the value was stored.
    pub stored_at: Instant,
    /// How long the value stays fresh.
    pub ttl: Duration,
}

impl<K, V> CacheEntry<K, V> {
    /// Creates an entry stored now.
    #[must_use]
    pub fn new(key: K, value: V, ttl: Duration) -> Self {
        Self {
            key,
            value,
            stored_at: Instant::now(),
            ttl,
        }
    }

    /// Returns whether the entry is expired at `now`.
    ///
    /// An entry is expired once strictly more than `ttl` has elapsed.
    #[must_use]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }

    /// Returns whether the entry is expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Stored entries, including ones not yet purged after expiry.
    pub entries: usize,
    /// Loads currently in flight.
    pub in_flight: usize,
}
