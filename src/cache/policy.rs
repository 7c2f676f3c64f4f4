//! Eviction Policy Module
//!
//! Orders entries for batch eviction. When the cache is at capacity the
//! policy cache removes the "oldest" 10% of entries (rounded up, minimum 1),
//! where oldest is defined by the active policy. Batch eviction amortizes
//! the sort across many inserts instead of paying it on every overflow.

use serde::{Deserialize, Serialize};

use crate::cache::entry::CacheEntry;
use crate::cache::store::EntryStore;

// == Eviction Policy ==
/// Ordering rule applied when the cache exceeds its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently used first (ascending `last_accessed_at`)
    #[default]
    Lru,
    /// Least frequently used first (ascending `access_count`)
    Lfu,
    /// Soonest to expire first (ascending `created_at + ttl`)
    Ttl,
    /// Oldest inserted first (ascending `created_at`)
    Fifo,
}

impl EvictionPolicy {
    /// Sort key for an entry under this policy; smaller sorts first and is
    /// evicted first.
    fn rank<T>(&self, entry: &CacheEntry<T>) -> u64 {
        match self {
            EvictionPolicy::Lru => entry.last_accessed_at,
            EvictionPolicy::Lfu => entry.access_count,
            EvictionPolicy::Ttl => entry.expires_at(),
            EvictionPolicy::Fifo => entry.created_at,
        }
    }
}

// == Victim Selection ==
/// Number of entries removed per eviction round: 10% of the store, rounded
/// up, never less than one.
pub fn eviction_batch_size(len: usize) -> usize {
    len.div_ceil(10).max(1)
}

/// Picks the keys to evict from `store` under `policy`.
///
/// Entries are ordered by the policy's rank ascending; equal ranks break
/// ties on priority, lower priority evicted first.
pub fn select_victims<T>(store: &EntryStore<T>, policy: EvictionPolicy) -> Vec<String> {
    let mut ranked: Vec<(String, u64, i64)> = store
        .iter()
        .map(|(key, entry)| (key.clone(), policy.rank(entry), entry.priority))
        .collect();

    ranked.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));

    let count = eviction_batch_size(ranked.len());
    ranked.into_iter().take(count).map(|(key, _, _)| key).collect()
}
