//! Concurrent store of cache bindings.
//!
//! Reads take a shard read lock on the map and never wait on
//! materialization or on the recency order. Bindings are only installed,
//! replaced or removed through [`CacheStore::put_if_absent`],
//! [`CacheStore::remove_if_same`] and the bulk clearing operations.
//!
//! A bounded store keeps its keys in an [`LruCache`] updated on insert and
//! removal. Reads promote their key only when the order is uncontended.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use polyglot_core::Timestamp;
use uuid::Uuid;

use super::entry::CacheEntry;
use super::key::CacheKey;
use crate::owner::{OwnerId, OwnerScope, StoreId, WeakOwner};

/// Snapshot of store activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Resolutions answered from a fully valid cached chain.
    pub hits: u64,
    /// Resolutions that had to take the slow path.
    pub misses: u64,
    /// Bundles produced by a materializer.
    pub materializations: u64,
    /// Tombstones stored after every format came up empty.
    pub tombstones: u64,
    /// Entries dropped because a reload check asked for it.
    pub reloads: u64,
    /// Bindings dropped to stay within capacity.
    pub evictions: u64,
    /// Bindings dropped because their owner went away.
    pub reclaimed: u64,
    /// Bindings currently stored.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    materializations: AtomicU64,
    tombstones: AtomicU64,
    reloads: AtomicU64,
    evictions: AtomicU64,
    reclaimed: AtomicU64,
}

/// Counter bumped by the resolution engine.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Counter {
    Hit,
    Miss,
    Materialization,
    Tombstone,
    Reload,
}

/// Capacity bound plus the recency order of bound keys.
struct Recency {
    capacity: usize,
    order: Mutex<LruCache<CacheKey, ()>>,
}

/// Concurrent map from [`CacheKey`] to cache entries.
pub struct CacheStore<B> {
    id: StoreId,
    entries: DashMap<CacheKey, Arc<CacheEntry<B>>>,
    /// `None` for unbounded stores.
    recency: Option<Recency>,
    /// Owners whose drop notifications this store subscribed to.
    watched: DashMap<OwnerId, WeakOwner>,
    reaper_tx: Sender<OwnerId>,
    reaper_rx: Receiver<OwnerId>,
    counters: Counters,
}

impl<B> CacheStore<B> {
    /// Create an unbounded store.
    pub fn new() -> Self {
        let (reaper_tx, reaper_rx) = crossbeam_channel::unbounded();
        Self {
            id: Uuid::now_v7(),
            entries: DashMap::new(),
            recency: None,
            watched: DashMap::new(),
            reaper_tx,
            reaper_rx,
            counters: Counters::default(),
        }
    }

    /// Create a store holding at most `capacity` bindings.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut store = Self::new();
        store.recency = Some(Recency {
            capacity: capacity.max(1),
            order: Mutex::new(LruCache::unbounded()),
        });
        store
    }

    pub fn capacity(&self) -> Option<usize> {
        self.recency.as_ref().map(|recency| recency.capacity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry<B>>> {
        let entry = self.entries.get(key).map(|r| Arc::clone(r.value()))?;
        if let Some(mut order) = self.recency.as_ref().and_then(|r| r.order.try_lock()) {
            order.promote(key);
        }
        Some(entry)
    }

    /// Install `entry` unless a usable binding already exists.
    ///
    /// Returns whichever entry ends up bound to the key. An existing binding
    /// is adopted while it is still valid, except that a tombstone never
    /// shadows a freshly materialized bundle.
    pub(crate) fn put_if_absent(
        &self,
        entry: Arc<CacheEntry<B>>,
        now: Timestamp,
    ) -> Arc<CacheEntry<B>> {
        let installed = match self.entries.entry(entry.key().clone()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get();
                let shadows_bundle = current.is_tombstone() && !entry.is_tombstone();
                let adopt = current.is_valid_at(now) && !shadows_bundle;
                if adopt {
                    Arc::clone(current)
                } else {
                    occupied.insert(Arc::clone(&entry));
                    entry
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&entry));
                entry
            }
        };
        if let Some(recency) = &self.recency {
            recency.order.lock().put(installed.key().clone(), ());
            self.evict_over_capacity(recency);
        }
        installed
    }

    /// Remove the binding for `entry`'s key if it is still `entry`.
    pub(crate) fn remove_if_same(&self, entry: &Arc<CacheEntry<B>>) -> bool {
        let removed = self
            .entries
            .remove_if(entry.key(), |_, bound| Arc::ptr_eq(bound, entry))
            .is_some();
        if removed {
            self.forget([entry.key().clone()]);
        }
        removed
    }

    /// Remove every binding scoped to `owner` (or every unscoped binding
    /// when `owner` is `None`). Returns the number removed.
    pub fn clear_owner(&self, owner: Option<OwnerId>) -> usize {
        self.remove_matching(|key| key.owner_id() == owner)
    }

    /// Remove every binding.
    pub fn clear(&self) {
        self.entries.clear();
        if let Some(recency) = &self.recency {
            recency.order.lock().clear();
        }
    }

    /// Subscribe to `owner`'s drop notification.
    pub(crate) fn watch_owner(&self, owner: &OwnerScope) {
        self.watched.entry(owner.id()).or_insert_with(|| {
            owner.watch(self.id, &self.reaper_tx);
            owner.downgrade()
        });
    }

    /// Drain pending owner drop notifications and purge those owners'
    /// bindings. Returns the number of bindings removed.
    pub fn reclaim_dead_owners(&self) -> usize {
        let dead: HashSet<OwnerId> = self.reaper_rx.try_iter().collect();
        if dead.is_empty() {
            return 0;
        }
        for id in &dead {
            self.watched.remove(id);
        }
        let removed =
            self.remove_matching(|key| key.owner_id().is_some_and(|id| dead.contains(&id)));
        self.counters
            .reclaimed
            .fetch_add(removed as u64, Ordering::Relaxed);
        tracing::debug!(owners = dead.len(), removed, "Reclaimed bindings of dropped owners");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CacheStats {
            hits: load(&self.counters.hits),
            misses: load(&self.counters.misses),
            materializations: load(&self.counters.materializations),
            tombstones: load(&self.counters.tombstones),
            reloads: load(&self.counters.reloads),
            evictions: load(&self.counters.evictions),
            reclaimed: load(&self.counters.reclaimed),
            entry_count: self.entries.len() as u64,
        }
    }

    pub(crate) fn record(&self, counter: Counter) {
        let target = match counter {
            Counter::Hit => &self.counters.hits,
            Counter::Miss => &self.counters.misses,
            Counter::Materialization => &self.counters.materializations,
            Counter::Tombstone => &self.counters.tombstones,
            Counter::Reload => &self.counters.reloads,
        };
        target.fetch_add(1, Ordering::Relaxed);
    }

    fn remove_matching(&self, matches: impl Fn(&CacheKey) -> bool) -> usize {
        let mut removed = Vec::new();
        self.entries.retain(|key, _| {
            let hit = matches(key);
            if hit {
                removed.push(key.clone());
            }
            !hit
        });
        let count = removed.len();
        self.forget(removed);
        count
    }

    /// Drop keys from the recency order. Never called under a map lock.
    fn forget(&self, keys: impl IntoIterator<Item = CacheKey>) {
        if let Some(recency) = &self.recency {
            let mut order = recency.order.lock();
            for key in keys {
                order.pop(&key);
            }
        }
    }

    /// Drop least-recently-used bindings until within capacity.
    ///
    /// Each victim is also marked expired: bundles further down its chain
    /// still link to it, and must fail their chain check and rebind.
    fn evict_over_capacity(&self, recency: &Recency) {
        let mut evicted = 0u64;
        while self.entries.len() > recency.capacity {
            let victim = {
                let mut order = recency.order.lock();
                if order.is_empty() {
                    // A key bound while its previous binding was being
                    // removed can drop out of the order.
                    for binding in self.entries.iter() {
                        order.put(binding.key().clone(), ());
                    }
                }
                order.pop_lru()
            };
            let Some((key, ())) = victim else {
                break;
            };
            if let Some((_, entry)) = self.entries.remove(&key) {
                entry.mark_expired();
                evicted += 1;
            }
        }
        if evicted > 0 {
            self.counters.evictions.fetch_add(evicted, Ordering::Relaxed);
            tracing::debug!(evicted, capacity = recency.capacity, "Evicted least recently used bindings");
        }
    }
}

impl<B> Default for CacheStore<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> Drop for CacheStore<B> {
    fn drop(&mut self) {
        for watched in self.watched.iter() {
            if let Some(owner) = watched.value().upgrade() {
                owner.unwatch(self.id);
            }
        }
    }
}

impl<B> std::fmt::Debug for CacheStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("id", &self.id)
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity())
            .field("watched", &self.watched.len())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
