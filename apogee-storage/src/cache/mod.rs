//! Freshness cache.
//!
//! A disposable overlay in front of the upstream APIs: entries are JSON
//! payloads stamped with their write time, and every read names the
//! [`FreshnessPolicy`] it accepts. Nothing is evicted; a later write for the
//! same key supersedes the earlier one.
//!
//! # Example
//!
//! ```ignore
//! let cache = ReadThroughCache::new(Arc::new(InMemoryCache::new()), FreshnessPolicy::default());
//! let read = cache
//!     .get_or_fetch("apod:recent-space", &cache.default_policy(), || client.fetch_recent())
//!     .await?;
//! if read.was_cache_hit() {
//!     tracing::debug!("served from cache");
//! }
//! ```

pub mod freshness;
pub mod lmdb_backend;
pub mod memory;
pub mod read_through;
pub mod traits;

pub use freshness::{CacheEntry, CacheRead, FreshnessPolicy, DEFAULT_TTL};
pub use lmdb_backend::{LmdbCache, LmdbError};
pub use memory::InMemoryCache;
pub use read_through::ReadThroughCache;
pub use traits::{CacheBackend, CacheStats};
