//! Cache Entry Module
//!
//! Defines the serializable entry record and the TTL type shared by every store.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Ttl ==
/// How long an entry lives after it is written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ttl {
    /// The entry never expires
    Forever,
    /// The entry expires this many seconds from now.
    ///
    /// NaN and infinite values behave as [`Ttl::Forever`]; zero or negative
    /// values produce an entry that is already expired.
    Seconds(f64),
}

impl Ttl {
    /// TTL of a whole number of seconds.
    pub fn secs(seconds: u64) -> Self {
        Ttl::Seconds(seconds as f64)
    }

    /// Absolute expiry timestamp for an entry written at `now_ms`.
    pub fn expires_at(self, now_ms: i64) -> Option<i64> {
        match self {
            Ttl::Seconds(secs) if secs.is_finite() => {
                Some(now_ms.saturating_add((secs * 1000.0) as i64))
            }
            _ => None,
        }
    }
}

impl From<u64> for Ttl {
    fn from(seconds: u64) -> Self {
        Ttl::secs(seconds)
    }
}

impl From<f64> for Ttl {
    fn from(seconds: f64) -> Self {
        Ttl::Seconds(seconds)
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Ttl::Seconds(duration.as_secs_f64())
    }
}

impl From<Option<u64>> for Ttl {
    fn from(seconds: Option<u64>) -> Self {
        seconds.map_or(Ttl::Forever, Ttl::secs)
    }
}

// == Cache Entry ==
/// A stored value plus its expiry metadata.
///
/// Serialized as `{ "value": .., "expiresAt": .., "key": .. }`; the last two
/// fields are omitted when unset. A record without `value` does not
/// deserialize and is treated as structurally invalid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// The stored value
    pub value: Value,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Original cache key, kept when the storage key is a hash of it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring according to `ttl`.
    pub fn new(value: Value, ttl: Ttl) -> Self {
        Self {
            value,
            expires_at: ttl.expires_at(current_timestamp_ms()),
            key: None,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its expiry timestamp.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Checks expiry against a fixed instant.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Remaining lifetime in whole seconds, rounded up.
    ///
    /// # Returns
    /// - `None` if the entry never expires or has already expired
    /// - `Some(seconds)` otherwise, always at least 1
    pub fn ttl_remaining(&self) -> Option<u64> {
        let expires = self.expires_at?;
        let remaining_ms = expires - current_timestamp_ms();
        if remaining_ms <= 0 {
            return None;
        }
        Some((remaining_ms as u64).div_ceil(1000))
    }

    /// Replaces the expiry, leaving the value untouched.
    pub fn retime(&mut self, ttl: Ttl) {
        self.expires_at = ttl.expires_at(current_timestamp_ms());
    }

    // == Counter ==
    /// Numeric reading of the value; anything non-numeric counts as 0.
    pub fn counter(&self) -> f64 {
        self.value.as_f64().unwrap_or(0.0)
    }

    /// Adds `amount` to the counter in place and returns the new total.
    ///
    /// Integer counters stay exact while the amount is a whole number and the
    /// sum fits in an `i64`. A non-finite amount or total leaves the value
    /// unchanged. The expiry is preserved.
    pub fn add_to_counter(&mut self, amount: f64) -> f64 {
        if let Some(total) = self.integer_sum(amount) {
            self.value = Value::from(total);
            return total as f64;
        }
        let total = self.counter() + amount;
        if !total.is_finite() {
            return self.counter();
        }
        self.value = number_value(total);
        total
    }

    fn integer_sum(&self, amount: f64) -> Option<i64> {
        let current = match &self.value {
            Value::Number(n) => n.as_i64()?,
            _ => 0,
        };
        current.checked_add(whole_i64(amount)?)
    }
}

/// `n` as an `i64` when it is a whole number inside the `i64` range.
fn whole_i64(n: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range.
    (n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64).then(|| n as i64)
}

/// Builds the next counter entry for `increment`/`decrement`.
///
/// A live entry keeps its expiry and original key; a missing or expired
/// entry restarts the counter at 0 with no expiry.
pub(crate) fn next_counter(existing: Option<CacheEntry>, amount: f64) -> (CacheEntry, f64) {
    let mut entry = existing
        .filter(|entry| !entry.is_expired())
        .unwrap_or_else(|| CacheEntry::new(Value::from(0), Ttl::Forever));
    let total = entry.add_to_counter(amount);
    (entry, total)
}

/// JSON representation of a counter value.
///
/// Integral values that fit in an `i64` are stored as JSON integers.
pub fn number_value(n: f64) -> Value {
    match whole_i64(n) {
        Some(whole) => Value::from(whole),
        // Non-finite numbers have no JSON form and become null.
        None => Value::from(n),
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}
