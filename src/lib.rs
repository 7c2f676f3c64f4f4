//! dashcache - Policy-driven caching for the dashboard's data layer
//!
//! A generic in-memory cache with TTL expiry, pluggable eviction policies
//! and durable persistence; a request-coalescing query layer on top of it;
//! a statistical memory-leak detector; and a registry tying them together
//! for unified statistics and global invalidation.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod leak;
pub mod models;
pub mod query;
pub mod registry;
pub mod storage;
pub mod tasks;

pub use api::AppState;
pub use cache::{AdvancedCache, CacheEntry, CacheStatsSnapshot, EvictionPolicy};
pub use config::{AppConfig, CacheConfig};
pub use error::{CacheError, QueryError};
pub use leak::{LeakDetector, LeakReport, MemoryProbe, MemorySample};
pub use query::QueryCache;
pub use registry::{CacheManager, ManagedCache, RegistryStats};
pub use storage::{FileStorage, MemoryStorage, StorageBackend};
pub use tasks::spawn_sweep_task;
