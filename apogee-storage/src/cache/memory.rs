//! Process-lifetime cache backed by a concurrent map.

use std::sync::atomic::{AtomicU64, Ordering};

use apogee_core::{ApogeeResult, Timestamp};
use async_trait::async_trait;
use dashmap::DashMap;

use super::freshness::CacheEntry;
use super::traits::{CacheBackend, CacheStats};

#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    size_bytes: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> ApogeeResult<Option<CacheEntry>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value().clone()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn put_at(
        &self,
        key: &str,
        payload: serde_json::Value,
        cached_at: Timestamp,
    ) -> ApogeeResult<CacheEntry> {
        let entry = CacheEntry::new(key, payload, cached_at);
        let size = entry.payload.to_string().len() as u64;
        self.entries.insert(key.to_string(), entry.clone());
        self.size_bytes.fetch_add(size, Ordering::Relaxed);
        Ok(entry)
    }

    async fn stats(&self) -> ApogeeResult<CacheStats> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
            size_bytes: self.size_bytes.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FreshnessPolicy;
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_put_then_get() -> ApogeeResult<()> {
        let cache = InMemoryCache::new();
        assert!(cache.get("manifest:curiosity").await?.is_none());

        cache.put("manifest:curiosity", json!({"total_photos": 10})).await?;
        let entry = cache.get("manifest:curiosity").await?;
        assert_eq!(entry.map(|e| e.payload), Some(json!({"total_photos": 10})));

        let stats = cache.stats().await?;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_last_write_wins() -> ApogeeResult<()> {
        let cache = InMemoryCache::new();
        cache.put("k", json!(1)).await?;
        cache.put("k", json!(2)).await?;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k").await?.map(|e| e.payload), Some(json!(2)));
        Ok(())
    }

    #[tokio::test]
    async fn test_is_fresh_respects_ttl() -> ApogeeResult<()> {
        let cache = InMemoryCache::new();
        let policy = FreshnessPolicy::Ttl(Duration::from_secs(60));

        assert!(!cache.is_fresh("apod:2024-01-01", &policy).await?);

        cache.put("apod:2024-01-01", json!({})).await?;
        assert!(cache.is_fresh("apod:2024-01-01", &policy).await?);

        let old = Utc::now() - chrono::Duration::seconds(61);
        cache.put_at("apod:2024-01-01", json!({}), old).await?;
        assert!(!cache.is_fresh("apod:2024-01-01", &policy).await?);
        Ok(())
    }
}
