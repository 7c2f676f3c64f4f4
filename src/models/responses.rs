//! Response DTOs for the ops API
//!
//! Defines the structure of outgoing HTTP response bodies. Stats and leak
//! reports serialize their domain types directly; only the envelope types
//! live here.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Response body for GET /health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process is serving
    pub status: String,
    /// Server time at response
    pub timestamp: DateTime<Utc>,
    /// Seconds since the ops server started
    pub uptime_secs: u64,
}

impl HealthResponse {
    pub fn healthy(uptime_secs: u64) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
            uptime_secs,
        }
    }
}

/// Response body for POST /invalidate.
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Human-readable summary of what was invalidated
    pub message: String,
    /// The pattern that was applied, absent for a full clear
    pub pattern: Option<String>,
}

impl InvalidateResponse {
    pub fn cleared_all() -> Self {
        Self {
            message: "All caches cleared".to_string(),
            pattern: None,
        }
    }

    pub fn matched(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        Self {
            message: format!("Invalidated keys containing '{}'", pattern),
            pattern: Some(pattern),
        }
    }
}
