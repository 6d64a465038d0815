//! Adapter Contract
//!
//! The operation set shared by every backing store. Stores implement the
//! primitives; batch operations, counters-by-negation and the
//! check-then-write helpers (`add`, `remember`) are provided on top.

use std::collections::HashMap;
use std::future::Future;

use serde_json::Value;
use tracing::debug;

use crate::cache::{Fallback, Ttl};
use crate::error::{CacheError, Result};

// == Cache Adapter ==
/// A key-value cache with TTL expiry.
///
/// Every method takes `&mut self` because reads reclaim expired storage as a
/// side effect. Reads never fail: unreadable storage behaves like a miss.
///
/// Check-then-write helpers are not atomic with respect to other handles on
/// the same storage; the last write wins.
pub trait CacheAdapter {
    /// Returns the live value for `key`.
    fn get(&mut self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`, replacing any previous entry.
    fn put(&mut self, key: &str, value: Value, ttl: Ttl);

    /// Whether `key` holds a live value. Reclaims the entry if it has expired.
    fn has(&mut self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes `key`. Returns whether an entry existed.
    fn forget(&mut self, key: &str) -> bool;

    /// Removes every entry, expired or not.
    fn flush(&mut self);

    /// All live keys. Expired entries found along the way are purged.
    fn keys(&mut self) -> Vec<String>;

    /// Storage footprint in bytes.
    fn size(&mut self) -> u64;

    /// Removes expired and structurally invalid entries, returning how many went.
    fn prune(&mut self) -> usize;

    /// Remaining lifetime of `key` in seconds, rounded up.
    ///
    /// `None` when the key is missing or never expires.
    fn ttl(&mut self, key: &str) -> Option<u64>;

    /// Replaces the expiry of a live entry. Returns false if there is none.
    fn touch(&mut self, key: &str, ttl: Ttl) -> bool;

    /// Adds `amount` to a numeric value and returns the new total.
    ///
    /// Missing, expired and non-numeric values start from 0. A live entry
    /// keeps its expiry.
    fn increment(&mut self, key: &str, amount: f64) -> f64;

    // == Provided Operations ==

    /// Returns the live value for `key`, or the resolved fallback on a miss.
    fn get_or(&mut self, key: &str, fallback: Fallback<'_>) -> Option<Value> {
        match self.get(key) {
            Some(value) => Some(value),
            None => fallback.resolve(),
        }
    }

    /// Returns the live value for `key` and removes the entry.
    fn pull(&mut self, key: &str) -> Option<Value> {
        let value = self.get(key);
        self.forget(key);
        value
    }

    /// Like [`CacheAdapter::pull`], resolving `fallback` on a miss.
    ///
    /// The entry is removed whether or not it was live.
    fn pull_or(&mut self, key: &str, fallback: Fallback<'_>) -> Option<Value> {
        let value = self.get_or(key, fallback);
        self.forget(key);
        value
    }

    /// Stores `value` with no expiry.
    fn forever(&mut self, key: &str, value: Value) {
        self.put(key, value, Ttl::Forever);
    }

    /// Stores `value` only if `key` has no live value. Returns whether it stored.
    fn add(&mut self, key: &str, value: Value, ttl: Ttl) -> bool {
        if self.has(key) {
            return false;
        }
        self.put(key, value, ttl);
        true
    }

    /// Subtracts `amount` from a numeric value and returns the new total.
    fn decrement(&mut self, key: &str, amount: f64) -> f64 {
        self.increment(key, -amount)
    }

    /// Number of live keys.
    fn count(&mut self) -> usize {
        self.keys().len()
    }

    /// Returns the live value for `key`, computing and storing it on a miss.
    ///
    /// # Errors
    /// Returns [`CacheError::Factory`] if `factory` fails; nothing is stored.
    fn remember<F>(&mut self, key: &str, ttl: Ttl, factory: F) -> Result<Value>
    where
        Self: Sized,
        F: FnOnce() -> anyhow::Result<Value>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        debug!(key, "remember miss, computing value");
        let value = factory().map_err(CacheError::Factory)?;
        self.put(key, value.clone(), ttl);
        Ok(value)
    }

    /// [`CacheAdapter::remember`] with no expiry.
    fn remember_forever<F>(&mut self, key: &str, factory: F) -> Result<Value>
    where
        Self: Sized,
        F: FnOnce() -> anyhow::Result<Value>,
    {
        self.remember(key, Ttl::Forever, factory)
    }

    // == Batch Operations ==

    /// Looks up each key. The result holds exactly the requested keys.
    fn get_many(&mut self, keys: &[&str]) -> HashMap<String, Option<Value>> {
        keys.iter()
            .map(|key| (key.to_string(), self.get(key)))
            .collect()
    }

    /// Stores every pair with the same TTL.
    fn put_many(&mut self, entries: HashMap<String, Value>, ttl: Ttl) {
        for (key, value) in entries {
            self.put(&key, value, ttl);
        }
    }

    /// Removes each key, returning how many existed.
    fn forget_many(&mut self, keys: &[&str]) -> usize {
        keys.iter().filter(|key| self.forget(key)).count()
    }
}

/// [`CacheAdapter::remember`] with an asynchronous factory.
///
/// The store is only touched before and after the factory runs, so the
/// lookup and the write are not atomic across the await point.
///
/// # Errors
/// Returns [`CacheError::Factory`] if the factory fails; nothing is stored.
pub async fn remember_async<A, F, Fut>(
    cache: &mut A,
    key: &str,
    ttl: Ttl,
    factory: F,
) -> Result<Value>
where
    A: CacheAdapter + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<Value>>,
{
    if let Some(value) = cache.get(key) {
        return Ok(value);
    }
    debug!(key, "remember miss, awaiting value");
    let value = factory().await.map_err(CacheError::Factory)?;
    cache.put(key, value.clone(), ttl);
    Ok(value)
}
