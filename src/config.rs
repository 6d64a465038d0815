//! Configuration Module
//!
//! Handles locating the backing storage for the file-based stores.

use std::env;
use std::path::PathBuf;

/// Name used for the default directory and file inside the OS temp directory.
const DEFAULT_NAME: &str = "keepsake";

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Directory holding one file per key (per-key file store)
    pub directory: PathBuf,
    /// Path of the single JSON document (flat-file store)
    pub file: PathBuf,
    /// Background prune task interval in seconds
    pub prune_interval: u64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `KEEPSAKE_DIR` - Per-key store directory (default: `<temp>/keepsake`)
    /// - `KEEPSAKE_FILE` - Flat-file store path (default: `<temp>/keepsake.json`)
    /// - `KEEPSAKE_PRUNE_INTERVAL` - Prune frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            directory: env::var_os("KEEPSAKE_DIR")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.directory),
            file: env::var_os("KEEPSAKE_FILE")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.file),
            prune_interval: env::var("KEEPSAKE_PRUNE_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.prune_interval),
        }
    }

    /// Default per-key store directory.
    pub fn default_directory() -> PathBuf {
        env::temp_dir().join(DEFAULT_NAME)
    }

    /// Default flat-file store path.
    pub fn default_file() -> PathBuf {
        env::temp_dir().join(format!("{DEFAULT_NAME}.json"))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: Self::default_directory(),
            file: Self::default_file(),
            prune_interval: 60,
        }
    }
}
