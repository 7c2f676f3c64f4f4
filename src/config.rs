//! Configuration Module
//!
//! Cache tuning knobs plus environment loading for the standalone binary.

use std::env;
use std::time::Duration;

use crate::cache::EvictionPolicy;

// == Cache Config ==
/// Per-cache configuration. This is the entire public configuration surface
/// of a cache instance; nothing else is read from the environment or files.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Hard cap on entry count; eviction runs before an insert would pass it
    pub max_size: usize,
    /// TTL applied when `set` omits one
    pub default_ttl: Duration,
    /// Cadence of the background expiry sweep
    pub check_interval: Duration,
    /// Ordering rule used when `max_size` is exceeded
    pub eviction_policy: EvictionPolicy,
    /// Whether the store is mirrored to durable storage
    pub persist_to_storage: bool,
    /// Durable slot name; required for persistence to actually engage
    pub storage_key: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            default_ttl: Duration::from_secs(300),
            check_interval: Duration::from_secs(60),
            eviction_policy: EvictionPolicy::Lru,
            persist_to_storage: false,
            storage_key: None,
        }
    }
}

impl CacheConfig {
    /// Recommended defaults for the query layer: smaller, persisted.
    pub fn query_defaults(storage_key: impl Into<String>) -> Self {
        Self {
            max_size: 500,
            persist_to_storage: true,
            storage_key: Some(storage_key.into()),
            ..Default::default()
        }
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    pub fn with_persistence(mut self, storage_key: impl Into<String>) -> Self {
        self.persist_to_storage = true;
        self.storage_key = Some(storage_key.into());
        self
    }
}

// == App Config ==
/// Configuration for the standalone ops binary, loaded from environment
/// variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Maximum number of entries in the query cache
    pub max_size: usize,
    /// Default TTL in seconds
    pub default_ttl_secs: u64,
    /// Expiry sweep interval in seconds
    pub check_interval_secs: u64,
    /// HTTP server port for the ops API
    pub server_port: u16,
    /// Directory for durable cache snapshots
    pub storage_dir: String,
    /// Registry monitoring interval in seconds
    pub monitor_interval_secs: u64,
}

impl AppConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `DASHCACHE_MAX_SIZE` - Maximum cache entries (default: 500)
    /// - `DASHCACHE_DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `DASHCACHE_CHECK_INTERVAL` - Sweep interval in seconds (default: 60)
    /// - `DASHCACHE_PORT` - HTTP server port (default: 3000)
    /// - `DASHCACHE_STORAGE_DIR` - Snapshot directory (default: ./dashcache-data)
    /// - `DASHCACHE_MONITOR_INTERVAL` - Registry monitor cadence (default: 60)
    pub fn from_env() -> Self {
        Self {
            max_size: env_parse("DASHCACHE_MAX_SIZE", 500),
            default_ttl_secs: env_parse("DASHCACHE_DEFAULT_TTL", 300),
            check_interval_secs: env_parse("DASHCACHE_CHECK_INTERVAL", 60),
            server_port: env_parse("DASHCACHE_PORT", 3000),
            storage_dir: env::var("DASHCACHE_STORAGE_DIR")
                .unwrap_or_else(|_| "./dashcache-data".to_string()),
            monitor_interval_secs: env_parse("DASHCACHE_MONITOR_INTERVAL", 60),
        }
    }

    /// The cache configuration implied by the app settings.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::query_defaults("dashboard-query-cache")
            .with_max_size(self.max_size)
            .with_default_ttl(Duration::from_secs(self.default_ttl_secs))
            .with_check_interval(Duration::from_secs(self.check_interval_secs))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_size: 500,
            default_ttl_secs: 300,
            check_interval_secs: 60,
            server_port: 3000,
            storage_dir: "./dashcache-data".to_string(),
            monitor_interval_secs: 60,
        }
    }
}

fn env_parse<V: std::str::FromStr>(name: &str, default: V) -> V {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
