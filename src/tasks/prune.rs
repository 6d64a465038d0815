//! Prune Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheAdapter;

/// Spawns a background task that periodically prunes a shared cache.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between runs. It takes the write lock for each `prune` and reads the
/// store's `size()` afterwards, so file-backed stores report bytes on disk.
///
/// # Arguments
/// * `cache` - shared handle to any store
/// * `interval_secs` - Interval in seconds between prune runs
///
/// # Returns
/// A JoinHandle for the spawned task; abort it to stop pruning.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(RwLock::new(MemoryStore::new()));
/// let prune_handle = spawn_prune_task(cache.clone(), 60);
/// // Later, during shutdown:
/// prune_handle.abort();
/// ```
pub fn spawn_prune_task<A>(cache: Arc<RwLock<A>>, interval_secs: u64) -> JoinHandle<()>
where
    A: CacheAdapter + Send + Sync + 'static,
{
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!(interval_secs, "starting cache prune task");

        loop {
            tokio::time::sleep(interval).await;

            let (removed, bytes) = {
                let mut cache_guard = cache.write().await;
                let removed = cache_guard.prune();
                (removed, cache_guard.size())
            };

            if removed > 0 {
                info!(removed, bytes, "prune task removed expired entries");
            } else {
                debug!(bytes, "prune task found no expired entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FileStore, FlatFileStore, MemoryStore, Ttl};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_prune_task_removes_expired_entries() {
        let cache = Arc::new(RwLock::new(MemoryStore::new()));

        cache
            .write()
            .await
            .put("expire_soon", json!("value"), Ttl::Seconds(0.5));

        let handle = spawn_prune_task(cache.clone(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(cache.read().await.is_empty(), "expired entry should be pruned");

        handle.abort();
    }

    #[tokio::test]
    async fn test_prune_task_preserves_valid_entries() {
        let cache = Arc::new(RwLock::new(MemoryStore::new()));

        cache
            .write()
            .await
            .put("long_lived", json!("value"), Ttl::secs(3600));

        let handle = spawn_prune_task(cache.clone(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.write().await.get("long_lived"), Some(json!("value")));

        handle.abort();
    }

    #[tokio::test]
    async fn test_prune_task_works_with_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatFileStore::new(dir.path().join("cache.json")).unwrap();
        let cache = Arc::new(RwLock::new(store));

        {
            let mut guard = cache.write().await;
            guard.put("gone", json!(1), Ttl::Seconds(0.5));
            guard.forever("kept", json!(2));
        }

        let handle = spawn_prune_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.abort();

        let document: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join("cache.json")).unwrap())
                .unwrap();
        assert_eq!(document, json!({"kept": {"value": 2}}));
    }

    #[tokio::test]
    async fn test_prune_task_shrinks_per_key_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("entries")).unwrap();
        let cache = Arc::new(RwLock::new(store));

        let before = {
            let mut guard = cache.write().await;
            guard.put("gone", json!("x".repeat(64)), Ttl::Seconds(0.5));
            guard.forever("kept", json!(2));
            guard.size()
        };

        let handle = spawn_prune_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.abort();

        let mut guard = cache.write().await;
        assert!(guard.size() < before);
        assert_eq!(guard.keys(), vec!["kept".to_string()]);
        assert_eq!(std::fs::read_dir(dir.path().join("entries")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_prune_task_can_be_aborted() {
        let cache = Arc::new(RwLock::new(MemoryStore::new()));

        let handle = spawn_prune_task(cache, 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
