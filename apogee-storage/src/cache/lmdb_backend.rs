//! LMDB-backed cache.
//!
//! Uses the heed crate (Rust bindings for LMDB) so cached upstream payloads
//! survive restarts. Values are stored as
//! `[cached_at millis, 8 bytes LE][payload JSON]`.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use apogee_core::{ApogeeError, ApogeeResult, StorageError, Timestamp};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use super::freshness::CacheEntry;
use super::traits::{CacheBackend, CacheStats};

/// Error type for LMDB operations, shared by the cache and the store.
#[derive(Debug, thiserror::Error)]
pub enum LmdbError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open a database within the environment.
    #[error("Failed to open database {name}: {reason}")]
    DbOpen { name: String, reason: String },

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt value under {key}: {reason}")]
    Deserialization { key: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<heed::Error> for LmdbError {
    fn from(e: heed::Error) -> Self {
        LmdbError::Transaction(e.to_string())
    }
}

impl From<LmdbError> for ApogeeError {
    fn from(e: LmdbError) -> Self {
        let storage = match e {
            LmdbError::EnvOpen(reason) => StorageError::OpenFailed {
                path: "lmdb".to_string(),
                reason,
            },
            LmdbError::Serialization(reason) => StorageError::Serialization { reason },
            LmdbError::Deserialization { key, reason } => {
                StorageError::Deserialization { key, reason }
            }
            other => StorageError::TransactionFailed {
                reason: other.to_string(),
            },
        };
        ApogeeError::Storage(storage)
    }
}

/// Open (creating if needed) an LMDB environment at `path`.
pub(crate) fn open_env<P: AsRef<Path>>(
    path: P,
    max_size_mb: usize,
    max_dbs: u32,
) -> Result<Env, LmdbError> {
    std::fs::create_dir_all(&path)?;

    // SAFETY: each environment directory is opened once per process.
    unsafe {
        EnvOpenOptions::new()
            .map_size(max_size_mb * 1024 * 1024)
            .max_dbs(max_dbs)
            .open(path.as_ref())
    }
    .map_err(|e| LmdbError::EnvOpen(e.to_string()))
}

pub(crate) fn create_db(env: &Env, name: &str) -> Result<Database<Bytes, Bytes>, LmdbError> {
    let mut wtxn = env.write_txn()?;
    let db: Database<Bytes, Bytes> = env
        .create_database(&mut wtxn, Some(name))
        .map_err(|e| LmdbError::DbOpen {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    wtxn.commit()?;
    Ok(db)
}

fn encode_entry(payload: &serde_json::Value, cached_at: Timestamp) -> Result<Vec<u8>, LmdbError> {
    let json = serde_json::to_vec(payload).map_err(|e| LmdbError::Serialization(e.to_string()))?;
    let mut buf = Vec::with_capacity(8 + json.len());
    buf.extend_from_slice(&cached_at.timestamp_millis().to_le_bytes());
    buf.extend_from_slice(&json);
    Ok(buf)
}

fn decode_entry(key: &str, bytes: &[u8]) -> Result<CacheEntry, LmdbError> {
    let corrupt = |reason: String| LmdbError::Deserialization {
        key: key.to_string(),
        reason,
    };
    if bytes.len() < 8 {
        return Err(corrupt(format!("value too short ({} bytes)", bytes.len())));
    }
    let (stamp, json) = bytes.split_at(8);
    let mut millis = [0u8; 8];
    millis.copy_from_slice(stamp);
    let cached_at: DateTime<Utc> = DateTime::from_timestamp_millis(i64::from_le_bytes(millis))
        .ok_or_else(|| corrupt("timestamp out of range".to_string()))?;
    let payload = serde_json::from_slice(json).map_err(|e| corrupt(e.to_string()))?;
    Ok(CacheEntry::new(key, payload, cached_at))
}

/// LMDB-backed cache.
///
/// # Example
///
/// ```ignore
/// use apogee_storage::cache::{CacheBackend, LmdbCache};
///
/// let cache = LmdbCache::new("/tmp/apogee-cache", 64)?;
/// cache.put("manifest:curiosity", payload).await?;
/// ```
pub struct LmdbCache {
    env: Env,
    db: Database<Bytes, Bytes>,
    hits: AtomicU64,
    misses: AtomicU64,
    size_bytes: AtomicU64,
}

impl LmdbCache {
    /// Open or create the cache under `path`, sized at `max_size_mb`.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbError> {
        let env = open_env(path, max_size_mb, 1)?;
        let db = create_db(&env, "cache")?;
        Ok(Self {
            env,
            db,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            size_bytes: AtomicU64::new(0),
        })
    }

    fn entry_count(&self) -> Result<u64, LmdbError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.db.len(&rtxn)?)
    }
}

#[async_trait]
impl CacheBackend for LmdbCache {
    async fn get(&self, key: &str) -> ApogeeResult<Option<CacheEntry>> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let found = self
            .db
            .get(&rtxn, key.as_bytes())
            .map_err(LmdbError::from)?;

        match found {
            Some(bytes) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(decode_entry(key, bytes)?))
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
        let bytes = encode_entry(&payload, cached_at)?;

        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), bytes.as_slice())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;

        self.size_bytes
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        // Round-trip through millis so callers see exactly what a later get returns.
        let stored_at = DateTime::from_timestamp_millis(cached_at.timestamp_millis()).unwrap_or(cached_at);
        Ok(CacheEntry::new(key, payload, stored_at))
    }

    async fn stats(&self) -> ApogeeResult<CacheStats> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entry_count()?,
            size_bytes: self.size_bytes.load(Ordering::Relaxed),
        })
    }
}
