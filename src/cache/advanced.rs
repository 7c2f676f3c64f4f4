//! Policy Cache Module
//!
//! Generic cache over the entry store. Owns eviction policy selection,
//! hit/miss accounting, the expiry sweep step, and optional durable
//! persistence. Callers wanting background sweeping wrap an instance in
//! `Arc<RwLock<_>>` and hand it to `tasks::spawn_sweep_task`.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::entry::CacheEntry;
use crate::cache::policy::select_victims;
use crate::cache::stats::{CacheStats, CacheStatsSnapshot};
use crate::cache::store::EntryStore;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::storage::StorageBackend;

// == Persisted State ==
/// On-disk shape of one cache snapshot. Private to this subsystem; re-read
/// only by the same code at startup, never a cross-version contract.
#[derive(Serialize, Deserialize)]
struct PersistedState<T> {
    entries: Vec<(String, CacheEntry<T>)>,
    stats: PersistedStats,
}

#[derive(Serialize, Deserialize)]
struct PersistedStats {
    hit_count: u64,
    miss_count: u64,
}

// == Advanced Cache ==
/// Policy-driven cache with TTL expiry, batch eviction and best-effort
/// durable persistence.
///
/// All operations are synchronous and never suspend; absence is a normal
/// outcome (`get` returns `Option`), never an error. Persistence failures
/// are logged and swallowed: the in-memory store stays authoritative for
/// the session.
pub struct AdvancedCache<T> {
    store: EntryStore<T>,
    stats: CacheStats,
    config: CacheConfig,
    storage: Option<Arc<dyn StorageBackend>>,
}

impl<T> AdvancedCache<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    // == Constructors ==
    /// Creates an in-memory cache. If the config requests persistence, the
    /// request is skipped (caching is advisory, misconfiguration is not a
    /// hard failure).
    pub fn new(config: CacheConfig) -> Self {
        if config.persist_to_storage {
            debug!("persistence requested but no storage backend attached, skipping");
        }
        Self {
            store: EntryStore::new(),
            stats: CacheStats::new(),
            config,
            storage: None,
        }
    }

    /// Creates a cache backed by durable storage and hydrates it from the
    /// configured slot, dropping entries that expired while persisted.
    ///
    /// Persistence only engages when the config sets both
    /// `persist_to_storage` and a `storage_key`; otherwise the backend is
    /// held but unused.
    pub fn with_storage(config: CacheConfig, storage: Arc<dyn StorageBackend>) -> Self {
        let mut cache = Self {
            store: EntryStore::new(),
            stats: CacheStats::new(),
            config,
            storage: Some(storage),
        };
        if cache.persistence_slot().is_some() {
            cache.hydrate();
        } else if cache.config.persist_to_storage {
            debug!("persist_to_storage set without storage_key, skipping persistence");
        }
        cache
    }

    fn persistence_slot(&self) -> Option<(&str, &Arc<dyn StorageBackend>)> {
        if !self.config.persist_to_storage {
            return None;
        }
        match (&self.config.storage_key, &self.storage) {
            (Some(slot), Some(backend)) => Some((slot.as_str(), backend)),
            _ => None,
        }
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// A hit bumps the entry's access metadata and the hit counter, then
    /// re-persists so restored recency/frequency ordering reflects reads.
    /// An absent or expired key counts as a miss; expired entries are
    /// removed on the way out.
    pub fn get(&mut self, key: &str) -> Option<T> {
        let expired = match self.store.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.store.remove(key);
            self.stats.record_miss();
            self.persist();
            return None;
        }

        let entry = self.store.get_mut(key)?;
        entry.touch();
        let value = entry.data.clone();
        self.stats.record_hit();
        self.persist();
        Some(value)
    }

    // == Set ==
    /// Inserts or replaces an entry.
    ///
    /// When inserting a new key into a full cache, the oldest batch under
    /// the active eviction policy is removed first. The entry is written
    /// with a fresh `created_at`; the full map is then persisted
    /// best-effort.
    pub fn set(&mut self, key: impl Into<String>, data: T, ttl: Option<Duration>, priority: Option<i64>) {
        let key = key.into();

        let is_replace = self.store.contains_key(&key);
        if !is_replace && self.store.len() >= self.config.max_size {
            self.evict_batch();
        }

        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let entry = CacheEntry::new(data, ttl, priority.unwrap_or(0));
        self.store.insert(key, entry);

        self.persist();
    }

    // == Delete ==
    /// Removes an entry, returning whether one was present.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.store.remove(key).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    // == Has ==
    /// True only if the key is present and unexpired. Does not count as a
    /// hit or miss and does not mutate access metadata.
    pub fn has(&self, key: &str) -> bool {
        self.store.get(key).map(|e| !e.is_expired()).unwrap_or(false)
    }

    // == Clear ==
    /// Empties the store and resets hit/miss counters.
    pub fn clear(&mut self) {
        self.store.clear();
        self.stats.reset();
        self.persist();
    }

    // == Snapshots ==
    pub fn keys(&self) -> Vec<String> {
        self.store.keys()
    }

    pub fn values(&self) -> Vec<T> {
        self.store.values()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    // == Stats ==
    /// Point-in-time statistics snapshot.
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            size: self.store.len(),
            max_size: self.config.max_size,
            hits: self.stats.hits,
            misses: self.stats.misses,
            evictions: self.stats.evictions,
            hit_rate: self.stats.hit_rate(),
            estimated_memory_bytes: self.estimated_memory_bytes(),
        }
    }

    fn estimated_memory_bytes(&self) -> usize {
        let key_bytes: usize = self.store.iter().map(|(k, _)| k.len()).sum();
        key_bytes + self.store.len() * mem::size_of::<CacheEntry<T>>()
    }

    // == Sweep ==
    /// One expiry sweep step: removes every entry past its TTL and
    /// re-persists. Driven by the recurring task in `tasks::cleanup` at
    /// `check_interval`; bounds growth from entries that are never read
    /// again.
    pub fn sweep_expired(&mut self) -> usize {
        let removed = self.store.purge_expired();
        if removed > 0 {
            self.persist();
        }
        removed
    }

    // == Eviction ==
    /// Removes the oldest 10% of entries (minimum one) under the active
    /// policy.
    fn evict_batch(&mut self) {
        for key in select_victims(&self.store, self.config.eviction_policy) {
            self.store.remove(&key);
            self.stats.record_eviction();
        }
    }

    // == Persistence ==
    /// Best-effort mirror of the full map plus counters to the durable
    /// slot. Failures are logged and never surfaced to the caller.
    fn persist(&self) {
        let Some((slot, backend)) = self.persistence_slot() else {
            return;
        };
        if let Err(err) = self.try_persist(slot, backend.as_ref()) {
            warn!(slot, error = %err, "cache persistence failed, in-memory store remains authoritative");
        }
    }

    fn try_persist(&self, slot: &str, backend: &dyn StorageBackend) -> Result<()> {
        let state = PersistedState {
            entries: self.store.snapshot(),
            stats: PersistedStats {
                hit_count: self.stats.hits,
                miss_count: self.stats.misses,
            },
        };
        let payload = serde_json::to_string(&state)?;
        backend.write(slot, &payload)
    }

    /// Loads the persisted snapshot, dropping already-expired entries.
    /// Read failures leave the cache empty and are logged only.
    fn hydrate(&mut self) {
        let Some((slot, backend)) = self.persistence_slot() else {
            return;
        };
        // Owned copies so the store assignment below does not alias the
        // config/storage borrows.
        let slot = slot.to_string();
        let backend = Arc::clone(backend);
        let loaded: Result<Option<PersistedState<T>>> = backend
            .read(&slot)
            .and_then(|payload| match payload {
                Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
                None => Ok(None),
            });

        match loaded {
            Ok(Some(state)) => {
                self.store = EntryStore::from_entries(state.entries);
                self.stats.hits = state.stats.hit_count;
                self.stats.misses = state.stats.miss_count;
                debug!(slot = %slot, entries = self.store.len(), "cache hydrated from durable storage");
            }
            Ok(None) => {}
            Err(err) => {
                warn!(slot = %slot, error = %err, "cache hydration failed, starting empty");
            }
        }
    }
}
