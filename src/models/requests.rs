//! Request DTOs for the ops API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Request body for POST /invalidate.
///
/// Omitting `pattern` clears every managed cache; supplying one removes
/// query-cache keys containing it as a substring.
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    /// Optional substring pattern
    #[serde(default)]
    pub pattern: Option<String>,
}
