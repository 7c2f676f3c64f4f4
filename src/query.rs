//! Deduplicating Query Layer
//!
//! Wraps one policy cache and coalesces duplicate in-flight work: for any
//! key, at most one producer invocation is outstanding at a time, no matter
//! how many callers ask. Late callers join the existing call through a
//! shared future and observe the identical resolution, success or failure.
//! Producers run on their own tasks, so a caller that stops awaiting does
//! not cancel the call or starve other joiners.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{AdvancedCache, CacheStatsSnapshot};
use crate::config::CacheConfig;
use crate::error::QueryError;
use crate::storage::StorageBackend;

/// One in-flight producer call, awaitable by any number of joiners.
type PendingFuture<T> = Shared<BoxFuture<'static, Result<T, QueryError>>>;

// == Query Cache ==
/// Request-coalescing façade over an [`AdvancedCache`].
///
/// The pending map holds one shared future per key; the entry is removed
/// the instant the producer settles, before the result is cached, so a
/// subsequent `fetch` after invalidation starts fresh work rather than
/// observing the stale call.
pub struct QueryCache<T> {
    cache: Arc<RwLock<AdvancedCache<T>>>,
    pending: Arc<Mutex<HashMap<String, PendingFuture<T>>>>,
}

impl<T> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<T> QueryCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    // == Constructors ==
    /// In-memory query cache.
    pub fn new(config: CacheConfig) -> Self {
        Self::from_cache(AdvancedCache::new(config))
    }

    /// Query cache whose policy cache persists to durable storage.
    pub fn with_storage(config: CacheConfig, storage: Arc<dyn StorageBackend>) -> Self {
        Self::from_cache(AdvancedCache::with_storage(config, storage))
    }

    fn from_cache(cache: AdvancedCache<T>) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Shared handle to the underlying policy cache, used to attach the
    /// background sweep task.
    pub fn inner(&self) -> Arc<RwLock<AdvancedCache<T>>> {
        Arc::clone(&self.cache)
    }

    // == Fetch ==
    /// Returns the cached value for `key`, or produces it.
    ///
    /// 1. Unless `force_refresh`, a cache hit resolves immediately.
    /// 2. An in-flight producer for the same key is joined, not duplicated.
    /// 3. Otherwise the producer runs on a spawned task; on success the
    ///    value is cached under the given TTL, on failure the error is
    ///    broadcast to all joiners and nothing is cached. Dropping the
    ///    returned future abandons the wait only; the call runs to
    ///    completion regardless.
    pub async fn fetch<F, Fut>(
        &self,
        key: &str,
        producer: F,
        ttl: Option<Duration>,
        force_refresh: bool,
    ) -> Result<T, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        if !force_refresh {
            if let Some(value) = self.cache.write().await.get(key) {
                return Ok(value);
            }
        }

        let shared = {
            let mut pending = self.pending.lock().expect("pending lock poisoned");
            if let Some(inflight) = pending.get(key) {
                debug!(key, "joining in-flight producer call");
                inflight.clone()
            } else {
                let fut = producer();
                let cache = Arc::clone(&self.cache);
                let pending_map = Arc::clone(&self.pending);
                let owned_key = key.to_string();
                // The producer runs on its own task: abandoning callers stop
                // awaiting, but the call still settles and its result still
                // lands in the cache.
                let task = tokio::spawn(async move {
                    let outcome = fut.await;
                    // Unregister the instant the producer settles, whether
                    // or not the result gets cached.
                    pending_map
                        .lock()
                        .expect("pending lock poisoned")
                        .remove(&owned_key);
                    match outcome {
                        Ok(value) => {
                            cache.write().await.set(owned_key, value.clone(), ttl, None);
                            Ok(value)
                        }
                        Err(err) => Err(QueryError::producer(err)),
                    }
                });
                let shared = async move {
                    match task.await {
                        Ok(result) => result,
                        Err(err) => Err(QueryError::producer(anyhow::Error::new(err))),
                    }
                }
                .boxed()
                .shared();
                pending.insert(key.to_string(), shared.clone());
                shared
            }
        };

        shared.await
    }

    // == Invalidate ==
    /// Removes cached entries.
    ///
    /// `None` clears everything; `Some(pattern)` removes every key
    /// containing the pattern as a substring. Substring containment is the
    /// single matching rule here; structured matching goes through
    /// [`QueryCache::invalidate_matching`]. In-flight producers are not
    /// cancelled; they settle normally.
    pub async fn invalidate(&self, pattern: Option<&str>) {
        match pattern {
            None => self.cache.write().await.clear(),
            Some(pattern) => {
                self.invalidate_matching(|key| key.contains(pattern)).await;
            }
        }
    }

    /// Removes every key the predicate matches.
    pub async fn invalidate_matching(&self, predicate: impl Fn(&str) -> bool) {
        let mut cache = self.cache.write().await;
        for key in cache.keys() {
            if predicate(&key) {
                cache.delete(&key);
            }
        }
    }

    // == Prefetch ==
    /// Warms the cache. No-op when the key is already present and
    /// unexpired; producer failures are logged, never returned, since
    /// prefetching is advisory.
    pub async fn prefetch<F, Fut>(&self, key: &str, producer: F, ttl: Option<Duration>)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        if self.cache.read().await.has(key) {
            return;
        }
        if let Err(err) = self.fetch(key, producer, ttl, false).await {
            warn!(key, error = %err, "prefetch failed");
        }
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStatsSnapshot {
        self.cache.read().await.stats()
    }

    /// Number of producer calls currently in flight.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("pending lock poisoned").len()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_cache() -> QueryCache<String> {
        QueryCache::new(CacheConfig::default())
    }

    #[tokio::test]
    async fn test_fetch_caches_result() {
        let cache = test_cache();
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let value = cache
                .fetch(
                    "report",
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok("data".to_string())
                    },
                    None,
                    false,
                )
                .await
                .unwrap();
            assert_eq!(value, "data");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1, "later fetches hit the cache");
    }

    #[tokio::test]
    async fn test_concurrent_fetches_join_one_producer() {
        let cache = test_cache();
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .fetch(
                        "slow",
                        move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok("joined".to_string())
                        },
                        None,
                        false,
                    )
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "joined");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "producer runs exactly once");
        assert_eq!(cache.pending_len(), 0, "pending entry removed on settle");
    }

    #[tokio::test]
    async fn test_producer_failure_broadcasts_to_joiners() {
        let cache = test_cache();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .fetch(
                        "failing",
                        || async {
                            tokio::time::sleep(Duration::from_millis(30)).await;
                            Err(anyhow::anyhow!("upstream down"))
                        },
                        None,
                        false,
                    )
                    .await
            }));
        }

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(err.to_string().contains("upstream down"));
        }

        // Failure caches nothing; a fresh fetch runs the producer again.
        assert_eq!(cache.pending_len(), 0);
        let value = cache
            .fetch("failing", || async { Ok("recovered".to_string()) }, None, false)
            .await
            .unwrap();
        assert_eq!(value, "recovered");
    }

    #[tokio::test]
    async fn test_abandoned_caller_does_not_cancel_producer() {
        let cache = test_cache();
        let completed = Arc::new(AtomicU32::new(0));

        let counter = completed.clone();
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            cache.fetch(
                "slow-report",
                move || async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok("settled".to_string())
                },
                None,
                false,
            ),
        )
        .await;
        assert!(abandoned.is_err(), "caller gives up before the producer settles");

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(completed.load(Ordering::SeqCst), 1, "producer still ran to completion");
        assert_eq!(cache.pending_len(), 0, "settled call left no pending entry");

        // The abandoned call's result was cached; no new producer runs.
        let value = cache
            .fetch("slow-report", || async { Ok("fresh".to_string()) }, None, false)
            .await
            .unwrap();
        assert_eq!(value, "settled");
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let cache = test_cache();
        let calls = Arc::new(AtomicU32::new(0));

        for expected in ["first", "second"] {
            let calls = calls.clone();
            let value = cache
                .fetch(
                    "volatile",
                    move || async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        Ok(if n == 0 { "first" } else { "second" }.to_string())
                    },
                    None,
                    true,
                )
                .await
                .unwrap();
            assert_eq!(value, expected);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_substring_scope() {
        let cache = test_cache();
        for key in ["user:1", "user:2", "order:1"] {
            cache
                .fetch(key, move || async move { Ok(key.to_string()) }, None, false)
                .await
                .unwrap();
        }

        cache.invalidate(Some("user:")).await;

        let inner = cache.inner();
        let mut guard = inner.write().await;
        assert_eq!(guard.get("order:1"), Some("order:1".to_string()));
        assert_eq!(guard.get("user:1"), None);
        assert_eq!(guard.get("user:2"), None);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache = test_cache();
        cache
            .fetch("a", || async { Ok("1".to_string()) }, None, false)
            .await
            .unwrap();

        cache.invalidate(None).await;

        assert_eq!(cache.stats().await.size, 0);
    }

    #[tokio::test]
    async fn test_prefetch_noop_when_present() {
        let cache = test_cache();
        let calls = Arc::new(AtomicU32::new(0));

        cache
            .fetch("warm", || async { Ok("cached".to_string()) }, None, false)
            .await
            .unwrap();

        let counter = calls.clone();
        cache
            .prefetch(
                "warm",
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok("new".to_string())
                },
                None,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0, "prefetch skips warm keys");
    }

    #[tokio::test]
    async fn test_prefetch_swallows_errors() {
        let cache = test_cache();

        // Must not panic or propagate.
        cache
            .prefetch("cold", || async { Err(anyhow::anyhow!("boom")) }, None)
            .await;

        assert_eq!(cache.stats().await.size, 0);
    }
}
