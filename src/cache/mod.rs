//! Cache Module
//!
//! Provides the adapter contract and its three backing stores: in-process
//! memory, one file per key, and a single flat JSON document.

mod adapter;
mod entry;
mod fallback;
mod file;
mod filename;
mod flat_file;
mod memory;
mod persist;


// Re-export public types
pub use adapter::{remember_async, CacheAdapter};
pub use entry::{current_timestamp_ms, number_value, CacheEntry, Ttl};
pub use fallback::Fallback;
pub use file::FileStore;
pub use filename::{decode_name, StorageName, HASHED_PREFIX, MAX_PLAIN_KEY_LENGTH};
pub use flat_file::FlatFileStore;
pub use memory::MemoryStore;
