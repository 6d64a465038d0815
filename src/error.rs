//! Error types for the cache
//!
//! Provides unified error handling using thiserror.
//!
//! Normal reads and writes never surface these to callers: adapters route
//! persistence failures through [`log_failure`] and carry on. Errors escape
//! only from constructors and from `remember` when the value factory fails.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Reading, writing or deleting a backing file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The cache directory could not be created
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An entry or document could not be encoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A caller-supplied value factory returned an error
    #[error("value factory failed: {0:#}")]
    Factory(anyhow::Error),
}

impl CacheError {
    /// Wraps an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

// == Failure Policy ==
/// Consumes the outcome of a persistence step.
///
/// Failures are logged and swallowed; the in-memory effect of the calling
/// operation stands. Returns `true` when the step succeeded.
pub(crate) fn log_failure(operation: &str, outcome: Result<()>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(error) => {
            warn!(operation, %error, "cache persistence failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mentions_path() {
        let err = CacheError::io(
            "/tmp/missing.json",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing.json"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn test_factory_error_display() {
        let err = CacheError::Factory(anyhow::anyhow!("upstream timed out"));
        assert_eq!(err.to_string(), "value factory failed: upstream timed out");
    }

    #[test]
    fn test_log_failure_reports_outcome() {
        assert!(log_failure("write", Ok(())));
        let failed = Err(CacheError::io(
            "x",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        ));
        assert!(!log_failure("write", failed));
    }
}
