//! Memory Store Module
//!
//! Entries held in a process-local HashMap keyed by the literal cache key.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::cache::entry::next_counter;
use crate::cache::{CacheAdapter, CacheEntry, Ttl};

// == Memory Store ==
/// In-process cache with no I/O.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty MemoryStore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entry for `key`, dropping it first if it has expired.
    fn live_entry(&mut self, key: &str) -> Option<&mut CacheEntry> {
        if self.entries.get(key)?.is_expired() {
            debug!(key, "reclaiming expired entry");
            self.entries.remove(key);
            return None;
        }
        self.entries.get_mut(key)
    }

    /// Number of physically held entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheAdapter for MemoryStore {
    fn get(&mut self, key: &str) -> Option<Value> {
        self.live_entry(key).map(|entry| entry.value.clone())
    }

    fn put(&mut self, key: &str, value: Value, ttl: Ttl) {
        self.entries.insert(key.to_string(), CacheEntry::new(value, ttl));
    }

    fn forget(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn flush(&mut self) {
        self.entries.clear();
    }

    fn keys(&mut self) -> Vec<String> {
        self.prune();
        self.entries.keys().cloned().collect()
    }

    // == Size ==
    /// Sum of each entry's serialized length. Unserializable entries are skipped.
    fn size(&mut self) -> u64 {
        self.entries
            .values()
            .filter_map(|entry| serde_json::to_vec(entry).ok())
            .map(|bytes| bytes.len() as u64)
            .sum()
    }

    // == Prune ==
    fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.entries.len()
    }

    fn ttl(&mut self, key: &str) -> Option<u64> {
        self.live_entry(key)?.ttl_remaining()
    }

    fn touch(&mut self, key: &str, ttl: Ttl) -> bool {
        match self.live_entry(key) {
            Some(entry) => {
                entry.retime(ttl);
                true
            }
            None => false,
        }
    }

    fn increment(&mut self, key: &str, amount: f64) -> f64 {
        let (entry, total) = next_counter(self.entries.remove(key), amount);
        self.entries.insert(key.to_string(), entry);
        total
    }
}
