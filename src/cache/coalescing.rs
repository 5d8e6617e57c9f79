//! TTL cache with per-key request coalescing.
//!
//! # Load Lifecycle
//!
//! ```text
//! get_or_load(key)
//!     │
//!     ├── fresh entry ─────────────► return value
//!     ├── pending load ────────────► subscribe, await shared outcome
//!     └── miss ──► register PendingLoad ──► spawn loader
//!                                              │
//!                       complete(key, load_id) ◄┘
//!                           ├── store value (success only)
//!                           ├── remove PendingLoad
//!                           └── broadcast outcome to all waiters
//! ```
//!
//! The loader runs on its own task. A caller that stops waiting (its future
//! is dropped) does not cancel the load; other waiters and the cache still
//! receive the result.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::error::{CacheError, CacheResult};
use super::types::{CacheEntry, CacheStats, NetworkClass, TtlPolicy};

/// Completion slot shared by every waiter of one load.
type Outcome<V> = Option<CacheResult<V>>;

/// An in-flight load for a single key.
struct PendingLoad<V> {
    id: u64,
    started_at: Instant,
    tx: watch::Sender<Outcome<V>>,
}

struct State<K, V> {
    entries: HashMap<K, CacheEntry<K, V>>,
    pending: HashMap<K, PendingLoad<V>>,
    next_load_id: u64,
    network: NetworkClass,
}

struct Inner<K, V> {
    policy: TtlPolicy,
    state: Mutex<State<K, V>>,
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Clone + Display,
    V: Clone,
{
    fn state(&self) -> MutexGuard<'_, State<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Settles load `id` for `key`.
    ///
    /// A load that was detached by `invalidate`/`clear` no longer owns the
    /// key; its outcome is dropped without touching the cache.
    fn complete(&self, key: &K, id: u64, outcome: CacheResult<V>, ttl: Duration) {
        let mut state = self.state();

        let owns_key = state.pending.get(key).is_some_and(|p| p.id == id);
        if !owns_key {
            debug!(key = %key, load_id = id, "Discarding result of detached load");
            return;
        }
        let Some(pending) = state.pending.remove(key) else {
            return;
        };

        if let Ok(value) = &outcome {
            state
                .entries
                .insert(key.clone(), CacheEntry::new(key.clone(), value.clone(), ttl));
        }
        drop(state);

        debug!(
            key = %key,
            load_id = id,
            waiters = pending.tx.receiver_count(),
            duration_ms = pending.started_at.elapsed().as_millis(),
            success = outcome.is_ok(),
            "Completing coalesced load"
        );
        pending.tx.send_replace(Some(outcome));
    }
}

/// Settles a load exactly once, even if the loader task panics or is aborted.
struct LoadGuard<K, V>
where
    K: Eq + Hash + Clone + Display,
    V: Clone,
{
    inner: Arc<Inner<K, V>>,
    key: K,
    id: u64,
    ttl: Duration,
    settled: bool,
}

impl<K, V> LoadGuard<K, V>
where
    K: Eq + Hash + Clone + Display,
    V: Clone,
{
    fn settle(mut self, outcome: CacheResult<V>) {
        self.settled = true;
        self.inner.complete(&self.key, self.id, outcome, self.ttl);
    }
}

impl<K, V> Drop for LoadGuard<K, V>
where
    K: Eq + Hash + Clone + Display,
    V: Clone,
{
    fn drop(&mut self) {
        if !self.settled {
            self.inner.complete(
                &self.key,
                self.id,
                Err(CacheError::Load(
                    "loader aborted before completing".to_string(),
                )),
                self.ttl,
            );
        }
    }
}

enum Lookup<V> {
    Hit(V),
    Join(watch::Receiver<Outcome<V>>),
    Lead {
        id: u64,
        ttl: Duration,
        rx: watch::Receiver<Outcome<V>>,
    },
}

/// Key/value cache with TTL expiry and in-flight request de-duplication.
///
/// At most one loader runs per key at any time. Callers that ask for a key
/// while its load is outstanding join that load and observe the identical
/// value or error. Failed loads are never cached.
///
/// Cloning a `CoalescingCache` yields another handle to the same store.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use mirror_core::cache::{CoalescingCache, TtlPolicy};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let cache: CoalescingCache<String, u32> =
///     CoalescingCache::new(TtlPolicy::uniform(Duration::from_secs(60)));
///
/// let value = cache
///     .get_or_load("answer".to_string(), || async { Ok::<_, String>(42) }, None)
///     .await
///     .unwrap();
/// assert_eq!(value, 42);
/// assert_eq!(cache.get(&"answer".to_string()), Some(42));
/// # });
/// ```
pub struct CoalescingCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for CoalescingCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> std::fmt::Debug for CoalescingCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescingCache")
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

impl<K, V> CoalescingCache<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache for a normal-class device.
    #[must_use]
    pub fn new(policy: TtlPolicy) -> Self {
        Self::with_network_class(policy, NetworkClass::Normal)
    }

    /// Creates an empty cache with an initial network classification.
    #[must_use]
    pub fn with_network_class(policy: TtlPolicy, network: NetworkClass) -> Self {
        Self {
            inner: Arc::new(Inner {
                policy,
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    pending: HashMap::new(),
                    next_load_id: 0,
                    network,
                }),
            }),
        }
    }

    /// Returns the injected TTL policy.
    #[must_use]
    pub fn policy(&self) -> TtlPolicy {
        self.inner.policy
    }

    /// Returns the current network classification.
    #[must_use]
    pub fn network_class(&self) -> NetworkClass {
        self.inner.state().network
    }

    /// Updates the network classification used for subsequent stores.
    pub fn set_network_class(&self, network: NetworkClass) {
        self.inner.state().network = network;
    }

    /// Returns the cached value for `key` if present and unexpired.
    ///
    /// Expired entries are left in place; they are dropped by the next
    /// [`get_or_load`](Self::get_or_load) or [`purge_expired`](Self::purge_expired).
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.inner
            .state()
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
    }

    /// Stores a value directly, bypassing any loader.
    pub fn insert(&self, key: K, value: V, ttl_override: Option<Duration>) {
        let mut state = self.inner.state();
        let ttl = ttl_override.unwrap_or_else(|| self.inner.policy.ttl_for(state.network));
        state
            .entries
            .insert(key.clone(), CacheEntry::new(key, value, ttl));
    }

    /// Returns the cached value, joins an in-flight load, or starts a new one.
    ///
    /// `loader` is invoked only when no fresh value and no pending load exist
    /// for `key`. Its future runs on a spawned task, so this method must be
    /// called from within a Tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `key` - Cache key
    /// * `loader` - Produces the future that fetches the value
    /// * `ttl_override` - TTL for the stored value; defaults to the policy TTL
    ///   for the current network class
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Load`] if the loader fails, or
    /// [`CacheError::Invalidated`] if the key is invalidated before the load
    /// completes. Every joined caller observes the same error.
    pub async fn get_or_load<F, Fut, E>(
        &self,
        key: K,
        loader: F,
        ttl_override: Option<Duration>,
    ) -> CacheResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        match self.lookup(&key, ttl_override) {
            Lookup::Hit(value) => {
                trace!(key = %key, "Cache hit");
                Ok(value)
            }
            Lookup::Join(rx) => {
                debug!(key = %key, "Joining in-flight load");
                Self::wait(rx).await
            }
            Lookup::Lead { id, ttl, rx } => {
                debug!(key = %key, load_id = id, "Starting load");
                let guard = LoadGuard {
                    inner: Arc::clone(&self.inner),
                    key,
                    id,
                    ttl,
                    settled: false,
                };
                let load = loader();
                tokio::spawn(async move {
                    let outcome = load.await.map_err(|e| CacheError::Load(e.to_string()));
                    guard.settle(outcome);
                });
                Self::wait(rx).await
            }
        }
    }

    /// Decides, under the lock, whether `key` is a hit, a join, or a new load.
    fn lookup(&self, key: &K, ttl_override: Option<Duration>) -> Lookup<V> {
        let mut state = self.inner.state();
        let now = Instant::now();

        let expired = match state.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => return Lookup::Hit(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            state.entries.remove(key);
        }

        if let Some(pending) = state.pending.get(key) {
            return Lookup::Join(pending.tx.subscribe());
        }

        let id = state.next_load_id;
        state.next_load_id += 1;
        let ttl = ttl_override.unwrap_or_else(|| self.inner.policy.ttl_for(state.network));
        let (tx, rx) = watch::channel(None);
        state.pending.insert(
            key.clone(),
            PendingLoad {
                id,
                started_at: now,
                tx,
            },
        );

        Lookup::Lead { id, ttl, rx }
    }

    async fn wait(mut rx: watch::Receiver<Outcome<V>>) -> CacheResult<V> {
        let settled = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| {
            Err(CacheError::Load(
                "load ended without producing a result".to_string(),
            ))
        })
    }

    /// Removes the entry for `key` and detaches any in-flight load.
    ///
    /// Waiters on a detached load are rejected with
    /// [`CacheError::Invalidated`]; the next `get_or_load` starts afresh.
    ///
    /// Returns `true` if an entry or a pending load was removed.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut state = self.inner.state();
        let removed_entry = state.entries.remove(key).is_some();
        let pending = state.pending.remove(key);
        drop(state);

        let had_pending = pending.is_some();
        if let Some(pending) = pending {
            debug!(key = %key, load_id = pending.id, "Invalidating in-flight load");
            pending
                .tx
                .send_replace(Some(Err(CacheError::Invalidated(key.to_string()))));
        }
        removed_entry || had_pending
    }

    /// Invalidates every key matching `predicate`.
    ///
    /// Returns the number of keys affected.
    pub fn invalidate_where<P>(&self, mut predicate: P) -> usize
    where
        P: FnMut(&K) -> bool,
    {
        let keys: Vec<K> = {
            let state = self.inner.state();
            state
                .entries
                .keys()
                .chain(state.pending.keys())
                .filter(|k| predicate(*k))
                .cloned()
                .collect()
        };
        keys.iter().filter(|k| self.invalidate(k)).count()
    }

    /// Invalidates every key.
    pub fn clear(&self) {
        let mut state = self.inner.state();
        state.entries.clear();
        let pending: Vec<(K, PendingLoad<V>)> = state.pending.drain().collect();
        drop(state);

        debug!(in_flight = pending.len(), "Clearing cache");
        for (key, load) in pending {
            load.tx
                .send_replace(Some(Err(CacheError::Invalidated(key.to_string()))));
        }
    }

    /// Drops expired entries. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.inner.state();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired_at(now));
        before - state.entries.len()
    }

    /// Returns current occupancy.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let state = self.inner.state();
        CacheStats {
            entries: state.entries.len(),
            in_flight: state.pending.len(),
        }
    }

    /// Returns whether a load for `key` is in flight.
    #[must_use]
    pub fn is_loading(&self, key: &K) -> bool {
        self.inner.state().pending.contains_key(key)
    }
}
