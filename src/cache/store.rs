//! Entry Store Module
//!
//! Pure keyed map of cache entries. No I/O, no policy decisions, no
//! statistics; the policy cache layers those on top.

use std::collections::HashMap;

use crate::cache::entry::{current_timestamp_ms, CacheEntry};

// == Entry Store ==
/// Keyed storage for cache entries.
#[derive(Debug, Default)]
pub struct EntryStore<T> {
    entries: HashMap<String, CacheEntry<T>>,
}

impl<T> EntryStore<T> {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Rebuilds a store from previously serialized entries, dropping any
    /// that are already expired.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, CacheEntry<T>)>) -> Self {
        let now = current_timestamp_ms();
        Self {
            entries: entries
                .into_iter()
                .filter(|(_, entry)| !entry.is_expired_at(now))
                .collect(),
        }
    }

    // == Access ==
    pub fn get(&self, key: &str) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut CacheEntry<T>> {
        self.entries.get_mut(key)
    }

    /// Inserts or replaces an entry.
    pub fn insert(&mut self, key: String, entry: CacheEntry<T>) {
        self.entries.insert(key, entry);
    }

    /// Removes an entry, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry<T>> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // == Iteration ==
    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheEntry<T>)> {
        self.entries.iter()
    }

    /// Owned snapshot of all keys; safe for the caller to mutate.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    // == Expiry Scan ==
    /// Removes every expired entry, returning how many were dropped.
    pub fn purge_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before - self.entries.len()
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> EntryStore<T> {
    /// Owned snapshot of all payloads.
    pub fn values(&self) -> Vec<T> {
        self.entries.values().map(|e| e.data.clone()).collect()
    }

    /// Snapshot of `(key, entry)` pairs, used by the persistence boundary.
    pub fn snapshot(&self) -> Vec<(String, CacheEntry<T>)> {
        self.entries
            .iter()
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_store_insert_and_get() {
        let mut store = EntryStore::new();
        store.insert(
            "key1".to_string(),
            CacheEntry::new("value1", Duration::from_secs(60), 0),
        );

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("key1").unwrap().data, "value1");
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_store_remove() {
        let mut store = EntryStore::new();
        store.insert(
            "key1".to_string(),
            CacheEntry::new(1u32, Duration::from_secs(60), 0),
        );

        assert!(store.remove("key1").is_some());
        assert!(store.remove("key1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_purge_expired() {
        let mut store = EntryStore::new();
        store.insert(
            "short".to_string(),
            CacheEntry::new(1u32, Duration::from_millis(30), 0),
        );
        store.insert(
            "long".to_string(),
            CacheEntry::new(2u32, Duration::from_secs(60), 0),
        );

        sleep(Duration::from_millis(60));

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains_key("long"));
    }

    #[test]
    fn test_store_from_entries_drops_expired() {
        let live = CacheEntry::new(1u32, Duration::from_secs(60), 0);
        let mut dead = CacheEntry::new(2u32, Duration::from_millis(10), 0);
        dead.created_at = dead.created_at.saturating_sub(1000);

        let store = EntryStore::from_entries(vec![
            ("live".to_string(), live),
            ("dead".to_string(), dead),
        ]);

        assert_eq!(store.len(), 1);
        assert!(store.contains_key("live"));
    }

    #[test]
    fn test_store_snapshot_is_detached() {
        let mut store = EntryStore::new();
        store.insert(
            "key1".to_string(),
            CacheEntry::new("v".to_string(), Duration::from_secs(60), 0),
        );

        let mut keys = store.keys();
        keys.clear();

        assert_eq!(store.len(), 1);
        assert_eq!(store.values(), vec!["v".to_string()]);
    }
}
