//! dashcache - standalone ops server for the dashboard caching layer
//!
//! Hosts the query cache with durable persistence, the expiry sweep, the
//! registry monitor and the leak detector, and serves the statistics API
//! the dashboard overlay consumes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dashcache::api::{create_router, AppState};
use dashcache::config::{AppConfig, CacheConfig};
use dashcache::query::QueryCache;
use dashcache::registry::CacheManager;
use dashcache::storage::FileStorage;
use dashcache::tasks::spawn_sweep_task;

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open durable storage and build the query cache (hydrates persisted entries)
/// 4. Start the background expiry sweep
/// 5. Build the registry and start monitoring (stats logging + leak sampling)
/// 6. Serve the ops API, with graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashcache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting dashcache ops server");

    let config = AppConfig::from_env();
    info!(
        "Configuration loaded: max_size={}, default_ttl={}s, port={}, check_interval={}s",
        config.max_size, config.default_ttl_secs, config.server_port, config.check_interval_secs
    );

    // Durable storage is best-effort: an unusable directory degrades to a
    // purely in-memory cache.
    let (manager, queries): (Arc<CacheManager>, QueryCache<Value>) =
        match FileStorage::new(&config.storage_dir) {
            Ok(storage) => {
                let storage = Arc::new(storage);
                (
                    Arc::new(CacheManager::with_storage(storage.clone())),
                    QueryCache::with_storage(config.cache_config(), storage),
                )
            }
            Err(err) => {
                warn!(error = %err, "storage directory unavailable, running without persistence");
                (
                    Arc::new(CacheManager::new()),
                    QueryCache::new(config.cache_config()),
                )
            }
        };

    run(config, manager, queries).await
}

async fn run(config: AppConfig, manager: Arc<CacheManager>, queries: QueryCache<Value>) {
    manager.register("queries", Arc::new(queries.clone()));

    // Image payloads keyed by URL; purely in-memory, longer-lived entries.
    let images: QueryCache<String> = QueryCache::new(
        CacheConfig::default()
            .with_max_size(200)
            .with_default_ttl(Duration::from_secs(1800)),
    );
    manager.register("images", Arc::new(images));
    info!("Caches initialized");

    let sweep_handle = spawn_sweep_task(
        queries.inner(),
        Duration::from_secs(config.check_interval_secs),
    );
    manager.start_monitoring(Duration::from_secs(config.monitor_interval_secs));
    info!("Background tasks started");

    let app = create_router(AppState::new(manager.clone(), queries));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            warn!(%addr, error = %err, "failed to bind ops port");
            return;
        }
    };
    info!("Server listening on http://{}", addr);

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        warn!(error = %err, "server exited with error");
    }

    sweep_handle.abort();
    manager.shutdown();
    info!("Server shutdown complete");
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            warn!("failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
