//! Flat-File Store Module
//!
//! The whole cache as one JSON object keyed by cache key. The document is
//! read once, on first use, into an in-memory mirror; every mutation then
//! rewrites the document through a temp file and rename.
//!
//! The mirror is authoritative for the lifetime of the store. If a rewrite
//! fails the change still holds in memory but is not durable.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::cache::entry::next_counter;
use crate::cache::persist;
use crate::cache::{CacheAdapter, CacheEntry, Ttl};
use crate::config::CacheConfig;
use crate::error::{log_failure, CacheError, Result};

// == Flat File Store ==
/// Cache persisted as a single JSON document.
#[derive(Debug)]
pub struct FlatFileStore {
    /// Path of the JSON document
    path: PathBuf,
    /// In-memory mirror of the document
    store: HashMap<String, CacheEntry>,
    /// Whether the document has been read into the mirror
    loaded: bool,
    /// Records dropped while loading, not yet reported by `prune`
    dropped_on_load: usize,
}

impl FlatFileStore {
    // == Constructor ==
    /// Creates a store backed by the document at `path`.
    ///
    /// Nothing is read until the first operation. The parent directory is
    /// created if missing.
    ///
    /// # Errors
    /// Returns [`CacheError::CreateDir`] if the parent directory cannot be created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CacheError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(Self {
            path,
            store: HashMap::new(),
            loaded: false,
            dropped_on_load: 0,
        })
    }

    /// Creates a store backed by the default document in the OS temp directory.
    pub fn in_temp_dir() -> Result<Self> {
        Self::new(CacheConfig::default_file())
    }

    /// Creates a store backed by the configured document.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::new(&config.file)
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the document has been read yet.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    // == Load ==
    /// Reads the document into the mirror the first time it is called.
    ///
    /// Invalid and expired records are dropped; if any were, the cleaned
    /// document is written back straight away.
    fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;

        let (store, dropped) = match self.read_document() {
            Ok(document) => Self::parse_document(document),
            Err(error) => {
                log_failure("load document", Err(error));
                (HashMap::new(), 0)
            }
        };
        debug!(
            path = %self.path.display(),
            entries = store.len(),
            dropped,
            "loaded flat-file cache"
        );
        self.store = store;
        self.dropped_on_load = dropped;

        if dropped > 0 {
            self.save();
        }
    }

    fn read_document(&self) -> Result<Map<String, Value>> {
        match persist::read_bytes(&self.path)? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(CacheError::from),
            None => Ok(Map::new()),
        }
    }

    fn parse_document(document: Map<String, Value>) -> (HashMap<String, CacheEntry>, usize) {
        let mut dropped = 0;
        let store = document
            .into_iter()
            .filter_map(|(key, record)| {
                match serde_json::from_value::<CacheEntry>(record) {
                    Ok(entry) if !entry.is_expired() => Some((key, entry)),
                    _ => {
                        dropped += 1;
                        None
                    }
                }
            })
            .collect();
        (store, dropped)
    }

    // == Save ==
    /// Rewrites the whole document from the mirror.
    fn save(&self) -> bool {
        let outcome = serde_json::to_vec(&self.store)
            .map_err(CacheError::from)
            .and_then(|bytes| persist::atomic_write_bytes(&self.path, &bytes));
        log_failure("save document", outcome)
    }

    /// Live entry for `key`, dropping it (and saving) if it has expired.
    fn live_entry(&mut self, key: &str) -> Option<&mut CacheEntry> {
        self.ensure_loaded();
        if self.store.get(key)?.is_expired() {
            debug!(key, "reclaiming expired entry");
            self.store.remove(key);
            self.save();
            return None;
        }
        self.store.get_mut(key)
    }
}

impl CacheAdapter for FlatFileStore {
    fn get(&mut self, key: &str) -> Option<Value> {
        self.live_entry(key).map(|entry| entry.value.clone())
    }

    fn put(&mut self, key: &str, value: Value, ttl: Ttl) {
        self.ensure_loaded();
        self.store.insert(key.to_string(), CacheEntry::new(value, ttl));
        self.save();
    }

    fn forget(&mut self, key: &str) -> bool {
        self.ensure_loaded();
        if self.store.remove(key).is_none() {
            return false;
        }
        self.save();
        true
    }

    // == Flush ==
    /// Empties the mirror and deletes the document outright.
    fn flush(&mut self) {
        self.store.clear();
        self.loaded = true;
        self.dropped_on_load = 0;
        log_failure("flush", persist::remove(&self.path).map(|_| ()));
        info!(path = %self.path.display(), "flushed flat-file cache");
    }

    fn keys(&mut self) -> Vec<String> {
        self.prune();
        let mut keys: Vec<String> = self.store.keys().cloned().collect();
        keys.sort();
        keys
    }

    // == Size ==
    /// Bytes on disk of the backing document; 0 if it does not exist.
    fn size(&mut self) -> u64 {
        self.ensure_loaded();
        match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        }
    }

    // == Prune ==
    /// Removes expired entries. Records already dropped by the initial load
    /// count toward the first prune after it.
    fn prune(&mut self) -> usize {
        self.ensure_loaded();
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired());
        let expired = before - self.store.len();
        if expired > 0 {
            self.save();
        }
        let removed = expired + std::mem::take(&mut self.dropped_on_load);
        if removed > 0 {
            info!(removed, "pruned flat-file cache");
        }
        removed
    }

    fn ttl(&mut self, key: &str) -> Option<u64> {
        self.live_entry(key)?.ttl_remaining()
    }

    fn touch(&mut self, key: &str, ttl: Ttl) -> bool {
        let Some(entry) = self.live_entry(key) else {
            return false;
        };
        entry.retime(ttl);
        self.save();
        true
    }

    fn increment(&mut self, key: &str, amount: f64) -> f64 {
        self.ensure_loaded();
        let (entry, total) = next_counter(self.store.remove(key), amount);
        self.store.insert(key.to_string(), entry);
        self.save();
        total
    }

    // == Batch Operations ==
    /// One rewrite for the whole batch.
    fn put_many(&mut self, entries: HashMap<String, Value>, ttl: Ttl) {
        self.ensure_loaded();
        for (key, value) in entries {
            self.store.insert(key, CacheEntry::new(value, ttl));
        }
        self.save();
    }

    /// One rewrite for the whole batch.
    fn forget_many(&mut self, keys: &[&str]) -> usize {
        self.ensure_loaded();
        let removed = keys
            .iter()
            .filter(|key| self.store.remove(**key).is_some())
            .count();
        if removed > 0 {
            self.save();
        }
        removed
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn open_store() -> (TempDir, FlatFileStore) {
        let dir = tempdir().unwrap();
        let store = FlatFileStore::new(dir.path().join("cache.json")).unwrap();
        (dir, store)
    }

    fn document(store: &FlatFileStore) -> Value {
        serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap()
    }

    #[test]
    fn test_construction_reads_nothing() {
        let (_dir, mut store) = open_store();
        assert!(!store.is_loaded());
        assert!(!store.path().exists());

        assert_eq!(store.get("anything"), None);
        assert!(store.is_loaded());
        assert!(!store.path().exists(), "a read must not create the document");
    }

    #[test]
    fn test_put_persists_whole_document() {
        let (_dir, mut store) = open_store();

        store.forever("a", json!(1));
        store.put("b", json!({"x": true}), Ttl::secs(60));

        let doc = document(&store);
        assert_eq!(doc["a"], json!({"value": 1}));
        assert_eq!(doc["b"]["value"], json!({"x": true}));
        assert!(doc["b"]["expiresAt"].is_i64());
    }

    #[test]
    fn test_reopen_sees_persisted_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        {
            let mut first = FlatFileStore::new(&path).unwrap();
            first.forever("greeting", json!("hello"));
        }

        let mut second = FlatFileStore::new(&path).unwrap();
        assert_eq!(second.get("greeting"), Some(json!("hello")));
    }

    #[test]
    fn test_load_drops_invalid_and_expired_records() {
        let (_dir, mut store) = open_store();
        fs::write(
            store.path(),
            serde_json::to_vec(&json!({
                "good": {"value": 1},
                "stale": {"value": 2, "expiresAt": 1},
                "broken": "not an entry",
                "hollow": {"expiresAt": null}
            }))
            .unwrap(),
        )
        .unwrap();

        assert_eq!(store.keys(), vec!["good".to_string()]);
        assert_eq!(document(&store), json!({"good": {"value": 1}}));
    }

    #[test]
    fn test_prune_counts_records_dropped_on_load() {
        let (_dir, mut store) = open_store();
        fs::write(
            store.path(),
            serde_json::to_vec(&json!({
                "good": {"value": 1},
                "stale": {"value": 2, "expiresAt": 1},
                "older": {"value": 3, "expiresAt": 1},
                "broken": "not an entry"
            }))
            .unwrap(),
        )
        .unwrap();

        assert_eq!(store.prune(), 3);
        assert_eq!(store.prune(), 0);
        assert_eq!(document(&store), json!({"good": {"value": 1}}));
    }

    #[test]
    fn test_corrupt_document_reads_as_empty() {
        let (_dir, mut store) = open_store();
        fs::write(store.path(), b"{ definitely not json").unwrap();

        assert_eq!(store.get_or("k", json!("default").into()), Some(json!("default")));
        assert_eq!(store.count(), 0);

        store.forever("k", json!("v"));
        assert_eq!(document(&store), json!({"k": {"value": "v"}}));
    }

    #[test]
    fn test_expired_read_rewrites_document() {
        let (_dir, mut store) = open_store();

        store.put("session", json!({"id": 1}), Ttl::Seconds(0.2));
        store.forever("other", json!(0));
        sleep(Duration::from_millis(300));

        assert_eq!(store.get_or("session", json!("GONE").into()), Some(json!("GONE")));
        assert_eq!(document(&store), json!({"other": {"value": 0}}));
        assert_eq!(store.ttl("session"), None);
    }

    #[test]
    fn test_forget_and_pull() {
        let (_dir, mut store) = open_store();

        store.forever("a", json!(1));
        store.forever("b", json!(2));

        assert!(store.forget("a"));
        assert!(!store.forget("a"));
        assert_eq!(store.pull("b"), Some(json!(2)));
        assert_eq!(document(&store), json!({}));
    }

    #[test]
    fn test_flush_deletes_document() {
        let (_dir, mut store) = open_store();

        store.forever("a", json!(1));
        store.put("b", json!(2), Ttl::secs(0));
        store.flush();

        assert!(!store.path().exists());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_prune_removes_only_expired() {
        let (_dir, mut store) = open_store();

        store.put("dead", json!(1), Ttl::secs(0));
        store.put("live", json!(2), Ttl::secs(60));

        assert_eq!(store.prune(), 1);
        assert_eq!(store.prune(), 0);
        assert_eq!(store.get("live"), Some(json!(2)));
    }

    #[test]
    fn test_touch_and_counters_persist() {
        let (_dir, mut store) = open_store();

        store.put("hits", json!(1), Ttl::secs(30));
        assert_eq!(store.increment("hits", 9.0), 10.0);
        assert_eq!(store.ttl("hits"), Some(30));
        assert!(store.touch("hits", Ttl::Forever));

        assert_eq!(document(&store), json!({"hits": {"value": 10}}));
        assert!(!store.touch("missing", Ttl::secs(1)));
    }

    #[test]
    fn test_size_is_document_length() {
        let (_dir, mut store) = open_store();
        assert_eq!(store.size(), 0);

        store.forever("k", json!("v"));
        assert_eq!(store.size(), r#"{"k":{"value":"v"}}"#.len() as u64);
    }

    #[test]
    fn test_batch_writes_once() {
        let (_dir, mut store) = open_store();

        store.put_many(
            HashMap::from([
                ("a".to_string(), json!(1)),
                ("b".to_string(), json!(2)),
            ]),
            Ttl::Forever,
        );
        assert_eq!(store.forget_many(&["a", "zzz"]), 1);

        assert_eq!(document(&store), json!({"b": {"value": 2}}));
    }

    #[test]
    fn test_unwritable_location_keeps_mirror() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut store = FlatFileStore::new(&path).unwrap();
        // A directory squatting on the target path makes the rename fail.
        fs::create_dir(&path).unwrap();

        store.forever("k", json!("still here"));

        assert_eq!(store.get("k"), Some(json!("still here")));
        assert!(path.is_dir());
    }
}
