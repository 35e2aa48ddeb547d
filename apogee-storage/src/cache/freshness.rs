//! Freshness policies and cache entries.
//!
//! A cache entry carries its write time; whether it may be served is decided
//! by the caller's [`FreshnessPolicy`] at read time, never stored with it.

use std::time::Duration;

use apogee_core::Timestamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Default time-to-live for upstream responses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// How old a cache entry may be and still be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessPolicy {
    /// Fresh while `now - cached_at < ttl`. An entry exactly `ttl` old is stale.
    Ttl(Duration),

    /// Fresh while the entry was written on the current UTC calendar day.
    /// Coarser than `Ttl`; used for rover metadata.
    CalendarDay,
}

impl FreshnessPolicy {
    /// TTL of `hours`, saturating at `u64::MAX` seconds.
    pub fn ttl_hours(hours: u64) -> Self {
        Self::Ttl(Duration::from_secs(hours.saturating_mul(60 * 60)))
    }

    /// Whether a value written at `cached_at` may be served at `now`.
    pub fn is_fresh_at(&self, cached_at: Timestamp, now: Timestamp) -> bool {
        match self {
            FreshnessPolicy::Ttl(ttl) => {
                let age = now.signed_duration_since(cached_at);
                match chrono::Duration::from_std(*ttl) {
                    Ok(ttl) => age < ttl,
                    // TTL beyond chrono's range never expires
                    Err(_) => true,
                }
            }
            FreshnessPolicy::CalendarDay => {
                cached_at.format("%Y-%m-%d").to_string() == now.format("%Y-%m-%d").to_string()
            }
        }
    }

    pub fn is_fresh(&self, cached_at: Timestamp) -> bool {
        self.is_fresh_at(cached_at, Utc::now())
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::Ttl(DEFAULT_TTL)
    }
}

/// A cached upstream payload. At most one entry exists per key; a later put
/// supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: serde_json::Value,
    pub cached_at: Timestamp,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, payload: serde_json::Value, cached_at: Timestamp) -> Self {
        Self {
            key: key.into(),
            payload,
            cached_at,
        }
    }

    pub fn is_fresh_at(&self, policy: &FreshnessPolicy, now: Timestamp) -> bool {
        policy.is_fresh_at(self.cached_at, now)
    }

    /// Age at `now`, zero if the entry appears to come from the future.
    pub fn age_at(&self, now: Timestamp) -> Duration {
        now.signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Result of a read-through lookup, carrying where the value came from.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    cached_at: Timestamp,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    pub fn from_cache(value: T, cached_at: Timestamp) -> Self {
        Self {
            value,
            cached_at,
            was_cache_hit: true,
        }
    }

    pub fn from_upstream(value: T) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
            was_cache_hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn cached_at(&self) -> Timestamp {
        self.cached_at
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }
}
