//! Per-Key File Store Module
//!
//! One JSON file per cache key inside a directory. Each file holds a single
//! [`CacheEntry`] and is rewritten whole on every update; files are
//! independent, so an interrupted write can only damage its own key.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::entry::next_counter;
use crate::cache::filename::{decode_name, StorageName};
use crate::cache::persist;
use crate::cache::{CacheAdapter, CacheEntry, Ttl};
use crate::config::CacheConfig;
use crate::error::{log_failure, CacheError, Result};

/// What a cache file turned out to hold.
#[derive(Debug)]
enum Slot {
    Missing,
    /// Unreadable or not an entry record
    Invalid,
    Expired,
    Live(CacheEntry),
}

// == File Store ==
/// Cache persisted as one file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    // == Constructor ==
    /// Opens a store in `directory`, creating it recursively if needed.
    ///
    /// # Errors
    /// Returns [`CacheError::CreateDir`] if the directory cannot be created.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|source| CacheError::CreateDir {
            path: directory.clone(),
            source,
        })?;
        debug!(directory = %directory.display(), "opened per-key file store");
        Ok(Self { directory })
    }

    /// Opens a store in the default directory under the OS temp directory.
    pub fn in_temp_dir() -> Result<Self> {
        Self::new(CacheConfig::default_directory())
    }

    /// Opens a store in the configured directory.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::new(&config.directory)
    }

    /// Directory holding the entry files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Full path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(StorageName::for_key(key).as_str())
    }

    fn inspect(path: &Path) -> Slot {
        let bytes = match persist::read_bytes(path) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Slot::Missing,
            Err(error) => {
                warn!(%error, "unreadable cache file");
                return Slot::Invalid;
            }
        };
        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) if entry.is_expired() => Slot::Expired,
            Ok(entry) => Slot::Live(entry),
            Err(error) => {
                debug!(path = %path.display(), %error, "malformed cache file");
                Slot::Invalid
            }
        }
    }

    /// Deletes a file whose entry has expired.
    fn reclaim(path: &Path) -> bool {
        debug!(path = %path.display(), "reclaiming expired entry");
        matches!(persist::remove(path), Ok(true))
    }

    /// Live entry for `key`, deleting its file first if it has expired.
    fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        let path = self.path_for(key);
        match Self::inspect(&path) {
            Slot::Live(entry) => Some(entry),
            Slot::Expired => {
                Self::reclaim(&path);
                None
            }
            Slot::Missing | Slot::Invalid => None,
        }
    }

    /// Writes `entry` under `key`, recording the key when the filename is a hash.
    fn write_entry(&self, key: &str, mut entry: CacheEntry) -> bool {
        let name = StorageName::for_key(key);
        entry.key = name.is_hashed().then(|| key.to_string());
        let path = self.directory.join(name.as_str());

        let outcome = serde_json::to_vec(&entry)
            .map_err(CacheError::from)
            .and_then(|bytes| persist::write_bytes(&path, &bytes));
        log_failure("write entry", outcome)
    }

    /// Files in the cache directory, skipping subdirectories and dotfiles.
    ///
    /// Encoded names never begin with `.`, so dotfiles are not ours.
    fn entry_files(&self) -> Vec<(String, PathBuf)> {
        let dir = match fs::read_dir(&self.directory) {
            Ok(dir) => dir,
            Err(source) => {
                log_failure("list entries", Err(CacheError::io(&self.directory, source)));
                return Vec::new();
            }
        };
        dir.flatten()
            .filter(|item| item.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|item| {
                let name = item.file_name().into_string().ok()?;
                (!name.starts_with('.')).then(|| (name, item.path()))
            })
            .collect()
    }
}

impl CacheAdapter for FileStore {
    fn get(&mut self, key: &str) -> Option<Value> {
        self.live_entry(key).map(|entry| entry.value)
    }

    fn put(&mut self, key: &str, value: Value, ttl: Ttl) {
        self.write_entry(key, CacheEntry::new(value, ttl));
    }

    fn forget(&mut self, key: &str) -> bool {
        match persist::remove(&self.path_for(key)) {
            Ok(removed) => removed,
            Err(error) => {
                log_failure("forget", Err(error));
                false
            }
        }
    }

    // == Flush ==
    /// Deletes every file in the directory, ignoring individual failures.
    fn flush(&mut self) {
        let Ok(dir) = fs::read_dir(&self.directory) else {
            return;
        };
        let removed = dir
            .flatten()
            .filter(|item| item.file_type().is_ok_and(|t| t.is_file()))
            .filter(|item| fs::remove_file(item.path()).is_ok())
            .count();
        info!(removed, "flushed per-key file store");
    }

    fn keys(&mut self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entry_files()
            .into_iter()
            .filter_map(|(name, path)| match Self::inspect(&path) {
                Slot::Live(entry) => entry.key.or_else(|| decode_name(&name)),
                Slot::Expired => {
                    Self::reclaim(&path);
                    None
                }
                Slot::Missing | Slot::Invalid => None,
            })
            .collect();
        keys.sort();
        keys
    }

    // == Size ==
    /// Bytes on disk across all entry files.
    fn size(&mut self) -> u64 {
        self.entry_files()
            .iter()
            .filter_map(|(_, path)| fs::metadata(path).ok())
            .map(|meta| meta.len())
            .sum()
    }

    // == Prune ==
    /// Deletes files holding expired or unparseable entries.
    fn prune(&mut self) -> usize {
        let removed = self
            .entry_files()
            .into_iter()
            .filter(|(_, path)| matches!(Self::inspect(path), Slot::Expired | Slot::Invalid))
            .filter(|(_, path)| {
                let outcome = persist::remove(path).map(|_| ());
                log_failure("prune", outcome)
            })
            .count();
        if removed > 0 {
            info!(removed, "pruned per-key file store");
        }
        removed
    }

    fn ttl(&mut self, key: &str) -> Option<u64> {
        self.live_entry(key)?.ttl_remaining()
    }

    fn touch(&mut self, key: &str, ttl: Ttl) -> bool {
        match self.live_entry(key) {
            Some(mut entry) => {
                entry.retime(ttl);
                self.write_entry(key, entry)
            }
            None => false,
        }
    }

    fn increment(&mut self, key: &str, amount: f64) -> f64 {
        let existing = match Self::inspect(&self.path_for(key)) {
            Slot::Live(entry) => Some(entry),
            Slot::Missing | Slot::Invalid | Slot::Expired => None,
        };
        let (entry, total) = next_counter(existing, amount);
        self.write_entry(key, entry);
        total
    }
}
