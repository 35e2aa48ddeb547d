//! APOGEE Storage - Freshness Cache and Persisted Store
//!
//! Two layers with separate lifetimes:
//! - `cache`: TTL-checked upstream payloads (in-memory or LMDB), safe to lose.
//! - `store`: the authoritative rover manifests, APOD and NEO records.

pub mod cache;
pub mod store;

pub use cache::{
    CacheBackend, CacheEntry, CacheRead, CacheStats, FreshnessPolicy, InMemoryCache, LmdbCache,
    LmdbError, ReadThroughCache, DEFAULT_TTL,
};
pub use store::{InMemoryStore, LmdbStore, ManifestStore, PeriodStoreKey, RecordStore, Store};
