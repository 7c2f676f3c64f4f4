//! API Routes
//!
//! Configures the Axum router for the ops surface.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    health_handler, invalidate_handler, leak_handler, stats_handler, AppState,
};

/// Creates the ops router.
///
/// # Endpoints
/// - `GET /health` - Liveness and uptime
/// - `GET /stats` - Aggregated cache statistics
/// - `GET /leak` - Leak detector report
/// - `POST /invalidate` - Pattern or full invalidation
///
/// # Middleware
/// - CORS: Allows any origin (the dashboard overlay runs cross-origin in dev)
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/leak", get(leak_handler))
        .route("/invalidate", post(invalidate_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
