//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support and
//! the access metadata used by the eviction policies.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// Represents a single cache entry with payload and metadata.
///
/// Entries are immutable once written: a `set` on an existing key replaces
/// the entry rather than mutating it in place. The only fields updated after
/// insertion are the access bookkeeping (`access_count`, `last_accessed_at`),
/// bumped on every successful read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The stored payload
    pub data: T,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Time-to-live in milliseconds, relative to `created_at`
    pub ttl_ms: u64,
    /// Number of successful reads of this entry
    pub access_count: u64,
    /// Timestamp of the most recent successful read (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Caller-supplied eviction hint, higher = less eligible for eviction
    pub priority: i64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a new cache entry with the given TTL and priority.
    pub fn new(data: T, ttl: Duration, priority: i64) -> Self {
        let now = current_timestamp_ms();
        Self {
            data,
            created_at: now,
            ttl_ms: ttl.as_millis() as u64,
            access_count: 0,
            last_accessed_at: now,
            priority,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has outlived its TTL.
    ///
    /// An entry is expired once `now - created_at` exceeds `ttl_ms`. At the
    /// exact boundary the entry is still considered live.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Expiry check against an explicit clock value, used by the sweep so a
    /// single `now` covers the whole scan.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at) > self.ttl_ms
    }

    // == Expiry Deadline ==
    /// Absolute timestamp (Unix milliseconds) at which the entry expires.
    pub fn expires_at(&self) -> u64 {
        self.created_at.saturating_add(self.ttl_ms)
    }

    // == Touch ==
    /// Records a successful read: bumps the access counter and recency stamp.
    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_accessed_at = current_timestamp_ms();
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new("payload".to_string(), Duration::from_secs(60), 0);

        assert_eq!(entry.data, "payload");
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.last_accessed_at, entry.created_at);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(1u32, Duration::from_millis(50), 0);

        assert!(!entry.is_expired());
        sleep(Duration::from_millis(80));
        assert!(entry.is_expired());
    }

    #[test]
    fn test_entry_not_expired_at_exact_boundary() {
        let entry = CacheEntry::new(1u32, Duration::from_millis(100), 0);

        // now - created_at == ttl is still live; strictly greater expires.
        assert!(!entry.is_expired_at(entry.created_at + 100));
        assert!(entry.is_expired_at(entry.created_at + 101));
    }

    #[test]
    fn test_entry_touch_updates_metadata() {
        let mut entry = CacheEntry::new(1u32, Duration::from_secs(60), 0);
        let created = entry.created_at;

        sleep(Duration::from_millis(10));
        entry.touch();
        entry.touch();

        assert_eq!(entry.access_count, 2);
        assert!(entry.last_accessed_at >= created);
        // created_at never moves after insertion
        assert_eq!(entry.created_at, created);
    }

    #[test]
    fn test_expires_at() {
        let entry = CacheEntry::new(1u32, Duration::from_secs(5), 0);
        assert_eq!(entry.expires_at(), entry.created_at + 5000);
    }

    #[test]
    fn test_entry_serde_round_trip() {
        let entry = CacheEntry::new(vec![1, 2, 3], Duration::from_secs(60), 7);
        let json = serde_json::to_string(&entry).unwrap();
        let back: CacheEntry<Vec<i32>> = serde_json::from_str(&json).unwrap();

        assert_eq!(back.data, vec![1, 2, 3]);
        assert_eq!(back.created_at, entry.created_at);
        assert_eq!(back.priority, 7);
    }
}
