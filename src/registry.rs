//! Cache Registry
//!
//! Process-wide façade over the managed caches and the leak detector.
//! Explicitly constructed and injected at application start (no module-level
//! globals), so tests build isolated instances; dispose with `shutdown` to
//! release the monitoring task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::CacheStatsSnapshot;
use crate::leak::{LeakDetector, LeakReport};
use crate::query::QueryCache;
use crate::storage::StorageBackend;

/// Durable-storage footprint above which the registry clears every cache.
/// The only place global, unsolicited eviction happens.
const STORAGE_HIGH_WATER_BYTES: u64 = 5 * 1024 * 1024;

// == Managed Cache Trait ==
/// The minimal surface the registry needs from each cache it manages.
#[async_trait]
pub trait ManagedCache: Send + Sync {
    async fn clear(&self);
    async fn stats(&self) -> CacheStatsSnapshot;
}

#[async_trait]
impl<T> ManagedCache for QueryCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn clear(&self) {
        self.invalidate(None).await;
    }

    async fn stats(&self) -> CacheStatsSnapshot {
        QueryCache::stats(self).await
    }
}

// == Registry Stats ==
/// Aggregate view across every managed cache.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    /// Per-cache snapshots, keyed by registration name
    pub caches: HashMap<String, CacheStatsSnapshot>,
    /// Total durable-storage footprint in bytes
    pub storage_usage_bytes: u64,
}

// == Cache Manager ==
/// Aggregates named caches plus the leak detector for unified statistics
/// and global invalidation.
pub struct CacheManager {
    caches: Arc<RwLock<HashMap<String, Arc<dyn ManagedCache>>>>,
    leak_detector: Arc<LeakDetector>,
    storage: Option<Arc<dyn StorageBackend>>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl CacheManager {
    pub fn new() -> Self {
        Self::build(None, LeakDetector::new())
    }

    /// Registry that also tracks durable-storage usage for the high-water
    /// safety valve.
    pub fn with_storage(storage: Arc<dyn StorageBackend>) -> Self {
        Self::build(Some(storage), LeakDetector::new())
    }

    /// Full control over collaborators, used by tests.
    pub fn with_parts(storage: Option<Arc<dyn StorageBackend>>, leak_detector: LeakDetector) -> Self {
        Self::build(storage, leak_detector)
    }

    fn build(storage: Option<Arc<dyn StorageBackend>>, leak_detector: LeakDetector) -> Self {
        Self {
            caches: Arc::new(RwLock::new(HashMap::new())),
            leak_detector: Arc::new(leak_detector),
            storage,
            monitor: Mutex::new(None),
        }
    }

    // == Registration ==
    /// Adds a cache under a well-known name, replacing any prior
    /// registration with that name.
    pub fn register(&self, name: impl Into<String>, cache: Arc<dyn ManagedCache>) {
        self.caches
            .write()
            .expect("registry lock poisoned")
            .insert(name.into(), cache);
    }

    fn cache_handles(&self) -> Vec<(String, Arc<dyn ManagedCache>)> {
        self.caches
            .read()
            .expect("registry lock poisoned")
            .iter()
            .map(|(name, cache)| (name.clone(), Arc::clone(cache)))
            .collect()
    }

    // == Clear All ==
    /// Unconditionally invalidates every managed cache.
    pub async fn clear_all(&self) {
        for (name, cache) in self.cache_handles() {
            cache.clear().await;
            info!(cache = %name, "cache cleared");
        }
    }

    // == Stats ==
    /// Aggregated statistics across all managed caches plus the durable
    /// storage estimate. Read-only.
    pub async fn stats(&self) -> RegistryStats {
        let mut caches = HashMap::new();
        for (name, cache) in self.cache_handles() {
            caches.insert(name, cache.stats().await);
        }
        RegistryStats {
            caches,
            storage_usage_bytes: self.storage.as_ref().map(|s| s.usage_bytes()).unwrap_or(0),
        }
    }

    // == Leak Detector ==
    pub fn leak_report(&self) -> LeakReport {
        self.leak_detector.report()
    }

    // == Monitoring ==
    /// Starts the periodic monitor: logs aggregate stats each interval and
    /// clears every cache when durable storage exceeds the high-water mark.
    /// Also starts leak sampling, which shares the registry's lifecycle.
    /// Idempotent while a monitor is already running.
    pub fn start_monitoring(&self, interval: Duration) {
        let mut monitor = self.monitor.lock().expect("monitor lock poisoned");
        if monitor.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        self.leak_detector.start();

        let caches = Arc::clone(&self.caches);
        let storage = self.storage.clone();
        info!(interval_secs = interval.as_secs(), "registry monitoring started");

        *monitor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;

                let handles: Vec<(String, Arc<dyn ManagedCache>)> = caches
                    .read()
                    .expect("registry lock poisoned")
                    .iter()
                    .map(|(name, cache)| (name.clone(), Arc::clone(cache)))
                    .collect();

                let mut total_entries = 0usize;
                for (name, cache) in &handles {
                    let stats = cache.stats().await;
                    total_entries += stats.size;
                    info!(
                        cache = %name,
                        size = stats.size,
                        hit_rate = stats.hit_rate,
                        evictions = stats.evictions,
                        "cache stats"
                    );
                }

                let usage = storage.as_ref().map(|s| s.usage_bytes()).unwrap_or(0);
                info!(total_entries, storage_bytes = usage, "registry aggregate");

                if usage > STORAGE_HIGH_WATER_BYTES {
                    warn!(
                        storage_bytes = usage,
                        high_water = STORAGE_HIGH_WATER_BYTES,
                        "durable storage over high-water mark, clearing all caches"
                    );
                    for (_, cache) in &handles {
                        cache.clear().await;
                    }
                }
            }
        }));
    }

    /// Stops the monitor and leak sampling. Safe to call more than once.
    pub fn shutdown(&self) {
        if let Ok(mut monitor) = self.monitor.lock() {
            if let Some(handle) = monitor.take() {
                handle.abort();
                info!("registry monitoring stopped");
            }
        }
        self.leak_detector.stop();
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::storage::MemoryStorage;

    fn registry_with_cache() -> (CacheManager, QueryCache<String>) {
        let manager = CacheManager::new();
        let cache: QueryCache<String> = QueryCache::new(CacheConfig::default());
        manager.register("queries", Arc::new(cache.clone()));
        (manager, cache)
    }

    #[tokio::test]
    async fn test_stats_aggregates_registered_caches() {
        let (manager, cache) = registry_with_cache();

        cache
            .fetch("a", || async { Ok("1".to_string()) }, None, false)
            .await
            .unwrap();

        let stats = manager.stats().await;
        assert_eq!(stats.caches.len(), 1);
        assert_eq!(stats.caches["queries"].size, 1);
        assert_eq!(stats.storage_usage_bytes, 0);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let (manager, cache) = registry_with_cache();

        cache
            .fetch("a", || async { Ok("1".to_string()) }, None, false)
            .await
            .unwrap();
        manager.clear_all().await;

        assert_eq!(manager.stats().await.caches["queries"].size, 0);
    }

    #[tokio::test]
    async fn test_storage_usage_reported() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write("slot", "0123456789").unwrap();

        let manager = CacheManager::with_storage(storage);
        assert_eq!(manager.stats().await.storage_usage_bytes, 14);
    }

    #[tokio::test]
    async fn test_monitor_clears_on_high_water() {
        let storage = Arc::new(MemoryStorage::new());
        // Push the backend over the 5 MiB mark.
        let blob = "x".repeat(6 * 1024 * 1024);
        storage.write("bloat", &blob).unwrap();

        let manager = CacheManager::with_storage(storage);
        let cache: QueryCache<String> = QueryCache::new(CacheConfig::default());
        manager.register("queries", Arc::new(cache.clone()));

        cache
            .fetch("a", || async { Ok("1".to_string()) }, None, false)
            .await
            .unwrap();

        manager.start_monitoring(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(80)).await;
        manager.shutdown();

        assert_eq!(
            manager.stats().await.caches["queries"].size,
            0,
            "high-water mark triggers clear_all"
        );
    }

    #[tokio::test]
    async fn test_start_monitoring_idempotent() {
        let (manager, _cache) = registry_with_cache();

        manager.start_monitoring(Duration::from_secs(60));
        manager.start_monitoring(Duration::from_secs(60)); // no-op
        manager.shutdown();
        manager.shutdown(); // no-op
    }

    #[tokio::test]
    async fn test_leak_report_exposed() {
        let (manager, _cache) = registry_with_cache();

        let report = manager.leak_report();
        assert!(!report.is_leaking);
        assert!(report.measurements.is_empty());
    }
}
