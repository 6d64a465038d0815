//! Keepsake - A small key-value cache
//!
//! One [`CacheAdapter`] contract with TTL expiry, counters and batch
//! operations, backed by an in-process map, one file per key, or a single
//! flat JSON file.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheAdapter, CacheEntry, Fallback, FileStore, FlatFileStore, MemoryStore, Ttl};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::spawn_prune_task;
