//! API Handlers
//!
//! HTTP request handlers for the ops surface: statistics, health, leak
//! report and invalidation. Everything but invalidation is read-only and
//! side-effect-free.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, Json};
use serde_json::Value;

use crate::leak::LeakReport;
use crate::models::{HealthResponse, InvalidateRequest, InvalidateResponse};
use crate::query::QueryCache;
use crate::registry::{CacheManager, RegistryStats};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The registry aggregating all caches and the leak detector
    pub manager: Arc<CacheManager>,
    /// The well-known query cache, target of pattern invalidation
    pub queries: QueryCache<Value>,
    /// When the ops server came up
    pub started_at: Instant,
}

impl AppState {
    pub fn new(manager: Arc<CacheManager>, queries: QueryCache<Value>) -> Self {
        Self {
            manager,
            queries,
            started_at: Instant::now(),
        }
    }
}

/// Handler for GET /health.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.started_at.elapsed().as_secs()))
}

/// Handler for GET /stats.
///
/// Aggregated per-cache statistics plus durable-storage usage.
pub async fn stats_handler(State(state): State<AppState>) -> Json<RegistryStats> {
    Json(state.manager.stats().await)
}

/// Handler for GET /leak.
///
/// Current leak detector window and trend.
pub async fn leak_handler(State(state): State<AppState>) -> Json<LeakReport> {
    Json(state.manager.leak_report())
}

/// Handler for POST /invalidate.
///
/// With a pattern, removes query-cache keys containing it; without one,
/// clears every managed cache.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Json<InvalidateResponse> {
    match req.pattern {
        Some(pattern) => {
            state.queries.invalidate(Some(pattern.as_str())).await;
            Json(InvalidateResponse::matched(pattern))
        }
        None => {
            state.manager.clear_all().await;
            Json(InvalidateResponse::cleared_all())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn test_state() -> AppState {
        let manager = Arc::new(CacheManager::new());
        let queries: QueryCache<Value> = QueryCache::new(CacheConfig::default());
        manager.register("queries", Arc::new(queries.clone()));
        AppState::new(manager, queries)
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler(State(test_state())).await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_stats_handler_reports_registered_cache() {
        let state = test_state();
        state
            .queries
            .fetch("k", || async { Ok(Value::from(1)) }, None, false)
            .await
            .unwrap();

        let response = stats_handler(State(state)).await;
        assert_eq!(response.caches["queries"].size, 1);
    }

    #[tokio::test]
    async fn test_invalidate_handler_pattern_scope() {
        let state = test_state();
        for key in ["user:1", "order:1"] {
            state
                .queries
                .fetch(key, move || async move { Ok(Value::from(key)) }, None, false)
                .await
                .unwrap();
        }

        let response = invalidate_handler(
            State(state.clone()),
            Json(InvalidateRequest {
                pattern: Some("user:".to_string()),
            }),
        )
        .await;

        assert_eq!(response.pattern.as_deref(), Some("user:"));
        assert_eq!(state.queries.stats().await.size, 1);
    }

    #[tokio::test]
    async fn test_invalidate_handler_clears_all_without_pattern() {
        let state = test_state();
        state
            .queries
            .fetch("k", || async { Ok(Value::from(1)) }, None, false)
            .await
            .unwrap();

        invalidate_handler(State(state.clone()), Json(InvalidateRequest { pattern: None })).await;

        assert_eq!(state.queries.stats().await.size, 0);
    }

    #[tokio::test]
    async fn test_leak_handler_empty_window() {
        let response = leak_handler(State(test_state())).await;
        assert!(!response.is_leaking);
    }
}
