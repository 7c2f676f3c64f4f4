//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries. Without
//! it, entries that are never read again would linger until capacity
//! pressure happened to evict them; the sweep bounds that growth.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::AdvancedCache;

/// Spawns the recurring expiry sweep for one cache instance.
///
/// One timer per instance: each firing runs to completion before the next,
/// so sweeps never overlap for the same cache. The returned handle must be
/// aborted at shutdown; leaving it running leaks the timer, not data.
pub fn spawn_sweep_task<T>(
    cache: Arc<RwLock<AdvancedCache<T>>>,
    interval: Duration,
) -> JoinHandle<()>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "expiry sweep task started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            ticker.tick().await;

            let removed = {
                let mut cache = cache.write().await;
                cache.sweep_expired()
            };

            if removed > 0 {
                info!(removed, "expiry sweep removed entries");
            } else {
                debug!("expiry sweep found nothing to remove");
            }
        }
    })
}
