//! Cache Module
//!
//! Policy-driven in-memory caching with TTL expiry, batch eviction under
//! LRU/LFU/TTL/FIFO ordering, and optional durable persistence.

mod advanced;
mod entry;
mod policy;
mod stats;
mod store;


// Re-export public types
pub use advanced::AdvancedCache;
pub use entry::{current_timestamp_ms, CacheEntry};
pub use policy::EvictionPolicy;
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use store::EntryStore;
