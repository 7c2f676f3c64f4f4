//! API Module
//!
//! HTTP handlers and routing for the ops surface. This is the only
//! interface the surrounding dashboard consumes; it is read-only except
//! for invalidation.
//!
//! # Endpoints
//! - `GET /health` - Liveness and uptime
//! - `GET /stats` - Aggregated cache statistics
//! - `GET /leak` - Leak detector report
//! - `POST /invalidate` - Pattern or full invalidation

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
