//! Error types for the caching layer
//!
//! Provides unified error handling using thiserror.
//!
//! Cache misses are not errors here: `get` returns `Option` and absence is a
//! normal outcome. The error types cover the two places something can
//! actually go wrong, the durable-persistence boundary and caller-supplied
//! producers.

use std::sync::Arc;

use thiserror::Error;

// == Cache Error Enum ==
/// Failures internal to the caching layer. These are always caught at the
/// boundary where they occur, logged, and never surfaced through `get`/`set`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Stored payload could not be (de)serialized
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage backend I/O failed
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

// == Query Error Enum ==
/// Failure of a caller-supplied producer, broadcast to every fetch caller
/// joined on the same key. Clone so a single failure can fan out to all
/// joiners of a shared in-flight call.
#[derive(Error, Debug, Clone)]
pub enum QueryError {
    #[error("producer failed: {0}")]
    Producer(Arc<anyhow::Error>),
}

impl QueryError {
    pub fn producer(err: anyhow::Error) -> Self {
        Self::Producer(Arc::new(err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the persistence boundary.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_is_cloneable() {
        let err = QueryError::producer(anyhow::anyhow!("upstream 503"));
        let other = err.clone();

        assert!(err.to_string().contains("upstream 503"));
        assert_eq!(err.to_string(), other.to_string());
    }

    #[test]
    fn test_cache_error_display() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "slot unwritable");
        let err = CacheError::from(io);
        assert!(err.to_string().contains("slot unwritable"));
    }
}
