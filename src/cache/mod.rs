//! Request-coalescing cache.
//!
//! This module provides [`CoalescingCache`], a key/value store with TTL
//! expiry that guarantees at most one concurrent load per key. UI components
//! can ask for the same resource independently without causing duplicate
//! network requests or observing divergent results.
//!
//! # Architecture
//!
//! ```text
//! CoalescingCache<K, V>
//!     ├── entries: K -> CacheEntry (value, stored_at, ttl)
//!     ├── pending: K -> PendingLoad (watch channel shared by waiters)
//!     └── TtlPolicy + NetworkClass (TTL selection)
//! ```
//!
//! # Freshness
//!
//! The TTL for a stored value is chosen from the injected [`TtlPolicy`]
//! according to the current [`NetworkClass`], unless the caller passes an
//! explicit override. Constrained devices get the longer TTL.

mod coalescing;
mod error;
pub mod types;

pub use coalescing::CoalescingCache;
pub use error::{CacheError, CacheResult};
pub use types::{CacheEntry, CacheStats, NetworkClass, TtlPolicy};
