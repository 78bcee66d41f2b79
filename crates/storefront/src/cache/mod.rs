//! Keyed, revalidating cache of backend data with optimistic local writes.
//!
//! # Ordering
//!
//! Every write to a key (fetch start, local write, invalidation) claims the
//! next value of that key's sequence counter. A fetch result is applied only
//! if its sequence number is still the newest for the key, so a slow stale
//! response never clobbers a newer fetch or an optimistic write. The sequence
//! is claimed when [`MutationCache::revalidate`] is *called*, not when the
//! returned future is first polled, so call order defines "latest".
//!
//! Teardown ([`MutationCache::invalidate`]) bumps a per-key generation
//! instead of aborting requests; responses from an older generation are
//! dropped on arrival.
//!
//! # Subscribers
//!
//! Each key owns a `tokio::sync::watch` channel. Writes publish before the
//! writing call returns, so every subscriber sees a local write before any
//! network I/O that follows it.
//!
//! Internal locks are never held across an `.await`. Closures passed to
//! [`MutationCache::update`] run under the lock and must not call back into
//! the cache.

mod snapshot;

pub use snapshot::{CacheStatus, Snapshot};

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use moka::sync::Cache;
use tokio::sync::watch;
use tracing::debug;

use crate::config::CacheConfig;

/// Identifies one fetch against one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    seq: u64,
    generation: u64,
}

struct Slot<T> {
    tx: watch::Sender<Snapshot<T>>,
    /// Latest sequence number claimed for this key.
    seq: u64,
    generation: u64,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            tx: watch::Sender::new(Snapshot::default()),
            seq: 0,
            generation: 0,
        }
    }
}

/// Shared, keyed mutation cache.
///
/// Construct one per value type at startup and hand clones to every
/// consumer; clones share state.
pub struct MutationCache<T> {
    inner: Arc<CacheInner<T>>,
}

struct CacheInner<T> {
    slots: Mutex<HashMap<String, Slot<T>>>,
    /// Keys whose last fetch settled within the dedupe interval.
    fresh: Cache<String, ()>,
    dedupe: bool,
}

impl<T> Clone for MutationCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> MutationCache<T> {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot<T>>> {
        self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for MutationCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationCache")
            .field("keys", &self.lock().len())
            .finish_non_exhaustive()
    }
}

impl<T> MutationCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new cache.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let dedupe = !config.dedupe_interval.is_zero();
        let mut builder = Cache::builder().max_capacity(config.capacity);
        if dedupe {
            builder = builder.time_to_live(config.dedupe_interval);
        }

        Self {
            inner: Arc::new(CacheInner {
                slots: Mutex::new(HashMap::new()),
                fresh: builder.build(),
                dedupe,
            }),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Subscribe to every change of `key`.
    #[must_use]
    pub fn subscribe(&self, key: &str) -> watch::Receiver<Snapshot<T>> {
        let mut slots = self.lock();
        slot_mut(&mut slots, key).tx.subscribe()
    }

    /// Current state of `key`.
    #[must_use]
    pub fn snapshot(&self, key: &str) -> Snapshot<T> {
        self.lock()
            .get(key)
            .map_or_else(Snapshot::default, |slot| slot.tx.borrow().clone())
    }

    /// Current value of `key`, if any.
    #[must_use]
    pub fn data(&self, key: &str) -> Option<T> {
        self.lock()
            .get(key)
            .and_then(|slot| slot.tx.borrow().data.clone())
    }

    /// Returns true while a fetch for `key` is outstanding.
    #[must_use]
    pub fn is_loading(&self, key: &str) -> bool {
        self.lock()
            .get(key)
            .is_some_and(|slot| slot.tx.borrow().is_loading())
    }

    // =========================================================================
    // Local writes
    // =========================================================================

    /// Replace the value of `key` without touching the network.
    ///
    /// Returns the previous value so the caller can restore it later.
    pub fn set(&self, key: &str, value: T) -> Option<T> {
        self.update(key, |_| value)
    }

    /// Compute a new value for `key` from the current one, without touching
    /// the network.
    ///
    /// Any fetch already in flight for `key` is superseded. Returns the
    /// previous value.
    pub fn update<F>(&self, key: &str, f: F) -> Option<T>
    where
        F: FnOnce(Option<&T>) -> T,
    {
        let mut slots = self.lock();
        let slot = slot_mut(&mut slots, key);
        slot.seq += 1;

        let mut previous = None;
        slot.tx.send_modify(|snapshot| {
            let next = f(snapshot.data.as_ref());
            previous = snapshot.data.replace(next);
            snapshot.status = CacheStatus::Settled;
            snapshot.error = None;
        });
        previous
    }

    // =========================================================================
    // Network
    // =========================================================================

    /// Refetch `key` with `fetch` and store the result.
    ///
    /// The key is marked `Loading` immediately. The returned future yields
    /// the fetch result; the cache only adopts it if no newer write to `key`
    /// happened meanwhile. Fetch errors are recorded on the snapshot (keeping
    /// the previous data) and returned.
    pub fn revalidate<Fut, E>(
        &self,
        key: &str,
        fetch: Fut,
    ) -> impl Future<Output = Result<T, E>> + use<T, Fut, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let tracked = self.revalidate_tracked(key, fetch);
        async move { tracked.await.0 }
    }

    /// Like [`MutationCache::revalidate`], also reporting whether the result
    /// was applied (`false` when a newer write superseded it).
    pub fn revalidate_tracked<Fut, E>(
        &self,
        key: &str,
        fetch: Fut,
    ) -> impl Future<Output = (Result<T, E>, bool)> + use<T, Fut, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let ticket = self.begin(key);
        let cache = self.clone();
        let key = key.to_string();

        async move {
            let result = fetch.await;
            let applied = cache.settle(&key, ticket, &result);
            (result, applied)
        }
    }

    /// Return the cached value of `key` if it settled within the dedupe
    /// interval, otherwise fetch it.
    ///
    /// # Errors
    ///
    /// Propagates the error of `fetch` when a fetch was needed and failed.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        if let Some(data) = self.fresh_data(key) {
            debug!(key = %key, "Cache hit");
            return Ok(data);
        }
        self.revalidate(key, fetch()).await
    }

    fn fresh_data(&self, key: &str) -> Option<T> {
        if !self.inner.dedupe || !self.inner.fresh.contains_key(key) {
            return None;
        }
        let slots = self.lock();
        let snapshot = slots.get(key)?.tx.borrow();
        if snapshot.status == CacheStatus::Settled {
            snapshot.data.clone()
        } else {
            None
        }
    }

    fn begin(&self, key: &str) -> Ticket {
        let mut slots = self.lock();
        let slot = slot_mut(&mut slots, key);
        slot.seq += 1;
        slot.tx.send_modify(|snapshot| snapshot.status = CacheStatus::Loading);
        Ticket {
            seq: slot.seq,
            generation: slot.generation,
        }
    }

    /// Apply a fetch result if `ticket` is still the newest write for `key`.
    fn settle<E: fmt::Display>(&self, key: &str, ticket: Ticket, result: &Result<T, E>) -> bool {
        let mut slots = self.lock();
        let Some(slot) = slots.get_mut(key) else {
            return false;
        };

        if slot.seq != ticket.seq || slot.generation != ticket.generation {
            debug!(
                key = %key,
                seq = ticket.seq,
                latest = slot.seq,
                "Discarding superseded response"
            );
            return false;
        }

        match result {
            Ok(value) => {
                slot.tx.send_modify(|snapshot| {
                    snapshot.data = Some(value.clone());
                    snapshot.status = CacheStatus::Settled;
                    snapshot.error = None;
                });
                if self.inner.dedupe {
                    self.inner.fresh.insert(key.to_string(), ());
                }
            }
            Err(error) => {
                let message: Arc<str> = Arc::from(error.to_string());
                slot.tx.send_modify(|snapshot| {
                    snapshot.status = CacheStatus::Error;
                    snapshot.error = Some(message);
                });
            }
        }
        true
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Forget `key`: reset it to `Empty` and stop honoring in-flight fetches.
    pub fn invalidate(&self, key: &str) {
        let mut slots = self.lock();
        if let Some(slot) = slots.get_mut(key) {
            reset(slot);
        }
        self.inner.fresh.invalidate(key);
    }

    /// Forget every key.
    pub fn invalidate_all(&self) {
        let mut slots = self.lock();
        for slot in slots.values_mut() {
            reset(slot);
        }
        self.inner.fresh.invalidate_all();
    }
}

fn slot_mut<'a, T>(slots: &'a mut HashMap<String, Slot<T>>, key: &str) -> &'a mut Slot<T> {
    slots.entry(key.to_string()).or_insert_with(Slot::new)
}

fn reset<T>(slot: &mut Slot<T>) {
    slot.generation += 1;
    slot.seq += 1;
    slot.tx.send_replace(Snapshot::default());
}
