//! API Configuration Module
//!
//! Typed configuration for the upstream client, the cache/store layer and
//! the HTTP server. Everything is loaded from environment variables with
//! defaults suitable for local development.

use std::time::Duration;

use apogee_storage::FreshnessPolicy;

use crate::constants::{
    DEFAULT_CACHE_TTL_HOURS, DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_ITEM_FETCH_DELAY_MS,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_NASA_BASE_URL, DEFAULT_RETRY_AFTER_SECS, DEFAULT_STORE_MAX_MB,
    DEFAULT_STORE_PATH, DEMO_API_KEY,
};

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|s| match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => default,
        })
        .unwrap_or(default)
}

// ============================================================================
// NASA UPSTREAM CONFIGURATION
// ============================================================================

/// Upstream client configuration.
#[derive(Debug, Clone)]
pub struct NasaConfig {
    /// API key appended to every request. `None` makes every upstream call
    /// fail with a configuration error before any network I/O.
    pub api_key: Option<String>,

    /// Base URL of the NASA open-data API (overridable for tests).
    pub base_url: String,

    /// Total attempts per request while the upstream answers 429.
    pub max_attempts: u32,

    /// Wait applied when a 429 carries no usable `Retry-After`.
    pub default_retry_after: Duration,

    /// Pause between consecutive per-sol photo fetches.
    pub item_fetch_delay: Duration,
}

impl Default for NasaConfig {
    fn default() -> Self {
        Self {
            api_key: Some(DEMO_API_KEY.to_string()),
            base_url: DEFAULT_NASA_BASE_URL.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            default_retry_after: Duration::from_secs(DEFAULT_RETRY_AFTER_SECS),
            item_fetch_delay: Duration::from_millis(DEFAULT_ITEM_FETCH_DELAY_MS),
        }
    }
}

impl NasaConfig {
    /// Create NasaConfig from environment variables.
    ///
    /// Environment variables:
    /// - `NASA_API_KEY` or `APOGEE_NASA_API_KEY`: API key
    /// - `APOGEE_ALLOW_DEMO_KEY`: fall back to `DEMO_KEY` when no key is set (default: true)
    /// - `APOGEE_NASA_BASE_URL`: upstream base URL (default: https://api.nasa.gov)
    /// - `APOGEE_MAX_ATTEMPTS`: attempts per rate-limited request (default: 3)
    /// - `APOGEE_DEFAULT_RETRY_AFTER_SECS`: fallback 429 wait (default: 60)
    /// - `APOGEE_ITEM_FETCH_DELAY_MS`: pause between per-sol fetches (default: 100)
    pub fn from_env() -> Self {
        let explicit_key = std::env::var("NASA_API_KEY")
            .or_else(|_| std::env::var("APOGEE_NASA_API_KEY"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let api_key = match explicit_key {
            Some(key) => Some(key),
            None if env_flag("APOGEE_ALLOW_DEMO_KEY", true) => {
                tracing::warn!(
                    "NASA_API_KEY not set, using the shared DEMO_KEY (heavily rate limited)"
                );
                Some(DEMO_API_KEY.to_string())
            }
            None => {
                tracing::warn!("NASA_API_KEY not set and DEMO_KEY disabled; upstream calls will fail");
                None
            }
        };

        let base_url = std::env::var("APOGEE_NASA_BASE_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_NASA_BASE_URL.to_string());

        let max_attempts = env_parse::<u32>("APOGEE_MAX_ATTEMPTS")
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);

        let default_retry_after = Duration::from_secs(
            env_parse("APOGEE_DEFAULT_RETRY_AFTER_SECS").unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        );

        let item_fetch_delay = Duration::from_millis(
            env_parse("APOGEE_ITEM_FETCH_DELAY_MS").unwrap_or(DEFAULT_ITEM_FETCH_DELAY_MS),
        );

        Self {
            api_key,
            base_url,
            max_attempts,
            default_retry_after,
            item_fetch_delay,
        }
    }

    /// Whether the configured key is the shared demo key.
    pub fn uses_demo_key(&self) -> bool {
        self.api_key.as_deref() == Some(DEMO_API_KEY)
    }
}

// ============================================================================
// CACHE / STORE CONFIGURATION
// ============================================================================

/// Which persisted store implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Lmdb,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lmdb" => Ok(StoreBackend::Lmdb),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

/// Freshness cache and persisted store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// LMDB environment directory. The cache lives in a `cache` subdirectory.
    pub path: String,

    /// LMDB map size in megabytes.
    pub max_size_mb: usize,

    /// TTL applied to upstream payloads and persisted APOD/NEO rows.
    pub cache_ttl_hours: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Lmdb,
            path: DEFAULT_STORE_PATH.to_string(),
            max_size_mb: DEFAULT_STORE_MAX_MB,
            cache_ttl_hours: DEFAULT_CACHE_TTL_HOURS,
        }
    }
}

impl StoreConfig {
    /// Create StoreConfig from environment variables.
    ///
    /// Environment variables:
    /// - `APOGEE_STORE_BACKEND`: "lmdb" or "memory" (default: lmdb)
    /// - `APOGEE_STORE_PATH`: LMDB directory (default: ./apogee-data)
    /// - `APOGEE_STORE_MAX_MB`: LMDB map size (default: 256)
    /// - `APOGEE_CACHE_TTL_HOURS` or `CACHE_DURATION_HOURS`: TTL in hours (default: 6)
    pub fn from_env() -> Self {
        let backend = std::env::var("APOGEE_STORE_BACKEND")
            .ok()
            .and_then(|s| match s.parse() {
                Ok(backend) => Some(backend),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring APOGEE_STORE_BACKEND");
                    None
                }
            })
            .unwrap_or(StoreBackend::Lmdb);

        let path = std::env::var("APOGEE_STORE_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STORE_PATH.to_string());

        let max_size_mb = env_parse("APOGEE_STORE_MAX_MB").unwrap_or(DEFAULT_STORE_MAX_MB);

        let cache_ttl_hours = env_parse::<u64>("APOGEE_CACHE_TTL_HOURS")
            .or_else(|| env_parse("CACHE_DURATION_HOURS"))
            .unwrap_or(DEFAULT_CACHE_TTL_HOURS);

        Self {
            backend,
            path,
            max_size_mb,
            cache_ttl_hours,
        }
    }

    /// In-memory store with default TTL, used by tests and `development()` setups.
    pub fn in_memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            ..Self::default()
        }
    }

    pub fn freshness_policy(&self) -> FreshnessPolicy {
        FreshnessPolicy::ttl_hours(self.cache_ttl_hours)
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP surface configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `APOGEE_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `APOGEE_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("APOGEE_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_max_age_secs =
            env_parse("APOGEE_CORS_MAX_AGE_SECS").unwrap_or(DEFAULT_CORS_MAX_AGE_SECS);

        Self {
            cors_origins,
            cors_max_age_secs,
        }
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }
}
