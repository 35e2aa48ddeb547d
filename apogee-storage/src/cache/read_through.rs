//! Read-through cache over any [`CacheBackend`].
//!
//! Callers name the freshness they accept on every read. A stale or
//! undecodable entry is a miss, and so is a backend read that fails; the
//! fetched value then supersedes it.

use std::future::Future;
use std::sync::Arc;

use apogee_core::ApogeeResult;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::freshness::{CacheRead, FreshnessPolicy};
use super::traits::{CacheBackend, CacheStats};

#[derive(Clone)]
pub struct ReadThroughCache {
    backend: Arc<dyn CacheBackend>,
    default_policy: FreshnessPolicy,
}

impl ReadThroughCache {
    pub fn new(backend: Arc<dyn CacheBackend>, default_policy: FreshnessPolicy) -> Self {
        Self {
            backend,
            default_policy,
        }
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// Policy for upstream payloads (the configured TTL).
    pub fn default_policy(&self) -> FreshnessPolicy {
        self.default_policy
    }

    /// The cached value under `key`, if present, fresh under `policy`, and
    /// decodable as `T`.
    pub async fn get_fresh<T: DeserializeOwned>(
        &self,
        key: &str,
        policy: &FreshnessPolicy,
    ) -> ApogeeResult<Option<CacheRead<T>>> {
        let entry = match self.backend.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed, treating as miss");
                return Ok(None);
            }
        };
        if !entry.is_fresh_at(policy, Utc::now()) {
            tracing::debug!(key, cached_at = %entry.cached_at, "Cache entry stale");
            return Ok(None);
        }
        match serde_json::from_value::<T>(entry.payload) {
            Ok(value) => Ok(Some(CacheRead::from_cache(value, entry.cached_at))),
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache entry has unexpected shape, treating as miss");
                Ok(None)
            }
        }
    }

    /// Overwrite the entry under `key`, stamped now.
    pub async fn store<T: Serialize>(&self, key: &str, value: &T) -> ApogeeResult<()> {
        let payload = serde_json::to_value(value).map_err(|e| {
            apogee_core::StorageError::Serialization {
                reason: e.to_string(),
            }
        })?;
        self.backend.put(key, payload).await?;
        Ok(())
    }

    /// Serve `key` from cache when fresh, otherwise run `fetch` and cache its
    /// result. A failed cache write is logged and the fetched value returned.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: &str,
        policy: &FreshnessPolicy,
        fetch: F,
    ) -> ApogeeResult<CacheRead<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApogeeResult<T>>,
    {
        if let Some(hit) = self.get_fresh(key, policy).await? {
            return Ok(hit);
        }
        let value = fetch().await?;
        if let Err(e) = self.store(key, &value).await {
            tracing::warn!(key, error = %e, "Failed to update cache entry");
        }
        Ok(CacheRead::from_upstream(value))
    }

    pub async fn stats(&self) -> ApogeeResult<CacheStats> {
        self.backend.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn cache() -> ReadThroughCache {
        ReadThroughCache::new(Arc::new(InMemoryCache::new()), FreshnessPolicy::default())
    }

    /// Backend whose reads always fail; writes land in memory.
    struct UnreadableBackend {
        inner: InMemoryCache,
    }

    #[async_trait::async_trait]
    impl CacheBackend for UnreadableBackend {
        async fn get(&self, _key: &str) -> ApogeeResult<Option<crate::cache::CacheEntry>> {
            Err(apogee_core::StorageError::TransactionFailed {
                reason: "cache environment unreadable".to_string(),
            }
            .into())
        }

        async fn put_at(
            &self,
            key: &str,
            payload: serde_json::Value,
            cached_at: apogee_core::Timestamp,
        ) -> ApogeeResult<crate::cache::CacheEntry> {
            self.inner.put_at(key, payload, cached_at).await
        }

        async fn stats(&self) -> ApogeeResult<CacheStats> {
            self.inner.stats().await
        }
    }

    #[tokio::test]
    async fn test_get_or_fetch_hits_after_first_call() -> ApogeeResult<()> {
        let cache = cache();
        let calls = AtomicU32::new(0);
        let policy = cache.default_policy();

        for _ in 0..3 {
            let read = cache
                .get_or_fetch("apod:recent-space", &policy, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["nebula".to_string()])
                })
                .await?;
            assert_eq!(read.value(), &vec!["nebula".to_string()]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_entry_is_refetched() -> ApogeeResult<()> {
        let cache = cache();
        let old = Utc::now() - chrono::Duration::seconds(120);
        cache
            .backend()
            .put_at("k", serde_json::json!(1), old)
            .await?;

        let policy = FreshnessPolicy::Ttl(Duration::from_secs(60));
        let read = cache.get_or_fetch("k", &policy, || async { Ok(2) }).await?;
        assert!(!read.was_cache_hit());
        assert_eq!(read.into_value(), 2);

        let again: Option<CacheRead<i32>> = cache.get_fresh("k", &policy).await?;
        assert_eq!(again.map(|r| r.into_value()), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_a_miss() -> ApogeeResult<()> {
        let cache = cache();
        cache.store("k", &"not a number").await?;
        let read: Option<CacheRead<u64>> = cache.get_fresh("k", &FreshnessPolicy::default()).await?;
        assert!(read.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_cached() -> ApogeeResult<()> {
        let cache = cache();
        let result: ApogeeResult<CacheRead<u32>> = cache
            .get_or_fetch("k", &FreshnessPolicy::default(), || async {
                Err(apogee_core::UpstreamError::Transport {
                    endpoint: "/planetary/apod".to_string(),
                    reason: "connection reset".to_string(),
                }
                .into())
            })
            .await;
        assert!(result.is_err());
        assert!(cache.backend().get("k").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_backend_read_failure_is_a_miss() -> ApogeeResult<()> {
        let cache = ReadThroughCache::new(
            Arc::new(UnreadableBackend {
                inner: InMemoryCache::new(),
            }),
            FreshnessPolicy::default(),
        );
        let policy = cache.default_policy();

        let read: Option<CacheRead<u32>> = cache.get_fresh("manifest:curiosity", &policy).await?;
        assert!(read.is_none());

        let calls = AtomicU32::new(0);
        for _ in 0..2 {
            let read = cache
                .get_or_fetch("manifest:curiosity", &policy, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7u32)
                })
                .await?;
            assert!(!read.was_cache_hit());
            assert_eq!(read.into_value(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok(())
    }
}
