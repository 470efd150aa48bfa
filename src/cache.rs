//! TTL cache for read views
//!
//! Keys are view names plus their parameters; values are the JSON the view
//! produced. Errors are never cached. Past `max_entries` live entries the
//! oldest is evicted.

use crate::config::default_cache_max_entries;
use crate::error::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::trace;

struct Entry {
    stored_at: Instant,
    ttl: Duration,
    value: Value,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    max_entries: usize,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::with_capacity(default_cache_max_entries())
    }
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries: max_entries.max(1),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.is_live())
            .map(|e| e.value.clone())
    }

    pub async fn insert(&self, key: impl Into<String>, ttl: Duration, value: Value) {
        let key = key.into();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.is_live());
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                trace!("cache full, evicting {}", oldest);
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                ttl,
                value,
            },
        );
    }

    /// Return the cached value for `key`, or compute, store and return it.
    /// Concurrent misses may compute twice; the later insert wins.
    pub async fn get_or_try_insert<F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(hit) = self.get(key).await {
            trace!("cache hit: {}", key);
            return Ok(hit);
        }
        let value = compute().await?;
        self.insert(key, ttl, value.clone()).await;
        Ok(value)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.values().filter(|e| e.is_live()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    #[tokio::test]
    async fn test_hit_skips_compute() {
        let cache = ResponseCache::new();
        let ttl = Duration::from_secs(60);

        let first = cache
            .get_or_try_insert("k", ttl, || async { Ok(json!(1)) })
            .await
            .unwrap();
        let second = cache
            .get_or_try_insert("k", ttl, || async { Ok(json!(2)) })
            .await
            .unwrap();

        assert_eq!(first, json!(1));
        assert_eq!(second, json!(1));
    }

    #[tokio::test]
    async fn test_expired_entry_recomputes() {
        let cache = ResponseCache::new();
        cache.insert("k", Duration::from_millis(5), json!("old")).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.get("k").await.is_none());
        let value = cache
            .get_or_try_insert("k", Duration::from_secs(60), || async { Ok(json!("new")) })
            .await
            .unwrap();
        assert_eq!(value, json!("new"));
    }

    #[tokio::test]
    async fn test_full_cache_evicts_oldest() {
        let cache = ResponseCache::with_capacity(2);
        let ttl = Duration::from_secs(60);

        cache.insert("a", ttl, json!(1)).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        cache.insert("b", ttl, json!(2)).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        cache.insert("c", ttl, json!(3)).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.get("c").await, Some(json!(3)));

        // Refreshing a present key does not evict anything
        cache.insert("c", ttl, json!(4)).await;
        assert_eq!(cache.get("b").await, Some(json!(2)));
        assert_eq!(cache.get("c").await, Some(json!(4)));
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = ResponseCache::new();
        let ttl = Duration::from_secs(60);

        let failed = cache
            .get_or_try_insert("k", ttl, || async { Err(Error::Other("boom".to_string())) })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty().await);
    }
}
