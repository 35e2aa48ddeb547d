//! Cache backend trait.
//!
//! Backends store opaque JSON payloads under string keys. There is no
//! eviction, capacity bound or invalidation: entries are only superseded by
//! a later `put` for the same key, last write wins.

use apogee_core::{ApogeeResult, Timestamp};
use async_trait::async_trait;
use chrono::Utc;

use super::freshness::{CacheEntry, FreshnessPolicy};

/// Pluggable cache backend (in-memory, LMDB).
///
/// Object safe so services can hold an `Arc<dyn CacheBackend>`.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get the entry for `key`, fresh or not.
    async fn get(&self, key: &str) -> ApogeeResult<Option<CacheEntry>>;

    /// Store `payload` under `key` with an explicit write time.
    async fn put_at(
        &self,
        key: &str,
        payload: serde_json::Value,
        cached_at: Timestamp,
    ) -> ApogeeResult<CacheEntry>;

    /// Store `payload` under `key`, stamped now.
    async fn put(&self, key: &str, payload: serde_json::Value) -> ApogeeResult<CacheEntry> {
        self.put_at(key, payload, Utc::now()).await
    }

    /// Whether an entry exists and satisfies `policy` right now.
    async fn is_fresh(&self, key: &str, policy: &FreshnessPolicy) -> ApogeeResult<bool> {
        Ok(self
            .get(key)
            .await?
            .map(|entry| entry.is_fresh_at(policy, Utc::now()))
            .unwrap_or(false))
    }

    async fn stats(&self) -> ApogeeResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry, regardless of freshness.
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
    /// Approximate payload bytes written (not reclaimed on overwrite).
    pub size_bytes: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
