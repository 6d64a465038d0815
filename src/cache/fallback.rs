//! Default-value resolution for cache misses.

use std::fmt;

use serde_json::Value;
use tracing::warn;

/// What a read returns when the key is missing, expired or unreadable.
pub enum Fallback<'a> {
    /// A ready-made value
    Literal(Value),
    /// A value computed lazily, only on a miss
    Factory(Box<dyn FnOnce() -> anyhow::Result<Value> + 'a>),
}

impl<'a> Fallback<'a> {
    /// Wraps a closure as a lazily evaluated fallback.
    pub fn factory<F>(f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<Value> + 'a,
    {
        Fallback::Factory(Box::new(f))
    }

    /// Produces the fallback value.
    ///
    /// A failing factory is logged and resolves to `None`.
    pub fn resolve(self) -> Option<Value> {
        match self {
            Fallback::Literal(value) => Some(value),
            Fallback::Factory(f) => match f() {
                Ok(value) => Some(value),
                Err(error) => {
                    warn!(error = %format!("{error:#}"), "fallback factory failed");
                    None
                }
            },
        }
    }
}

impl From<Value> for Fallback<'_> {
    fn from(value: Value) -> Self {
        Fallback::Literal(value)
    }
}

impl fmt::Debug for Fallback<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallback::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Fallback::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}
