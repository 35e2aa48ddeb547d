//! Constants for APOGEE API
//!
//! Defaults for every tunable, collected in one place.

// ============================================================================
// UPSTREAM
// ============================================================================

/// Public NASA open-data API host
pub const DEFAULT_NASA_BASE_URL: &str = "https://api.nasa.gov";

/// Shared rate-limited key NASA hands out for experimentation
pub const DEMO_API_KEY: &str = "DEMO_KEY";

/// Total attempts per request when the upstream answers 429
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Wait before retrying a 429 that carries no usable Retry-After header
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Pause between consecutive per-sol photo fetches
pub const DEFAULT_ITEM_FETCH_DELAY_MS: u64 = 100;

// ============================================================================
// CACHE / STORE
// ============================================================================

/// Default cache TTL (6 hours)
pub const DEFAULT_CACHE_TTL_HOURS: u64 = 6;

/// Default LMDB directory
pub const DEFAULT_STORE_PATH: &str = "./apogee-data";

/// Default LMDB map size
pub const DEFAULT_STORE_MAX_MB: usize = 256;

// ============================================================================
// ROVERS
// ============================================================================

/// Rover queried when a GraphQL caller names none
pub const DEFAULT_ROVER: &str = "curiosity";

/// Most sols one photo query may name; each may cost an upstream fetch
pub const MAX_SOLS_PER_REQUEST: usize = 25;

// ============================================================================
// APOD / NEO
// ============================================================================

/// Days of history scanned for recent space images
pub const APOD_RECENT_WINDOW_DAYS: i64 = 30;

/// Title/explanation keywords that mark an APOD as a space image
pub const SPACE_IMAGE_KEYWORDS: &[&str] = &[
    "nebula", "galaxy", "cluster", "moon", "sun", "planet", "star", "comet", "asteroid", "aurora",
];

/// Longest NEO feed window the upstream accepts (end - start, in days)
pub const NEO_MAX_SPAN_DAYS: i64 = 7;

/// Default NEO feed window when no end date is given (today + 6)
pub const NEO_DEFAULT_SPAN_DAYS: i64 = 6;

// ============================================================================
// BACKGROUND SYNC
// ============================================================================

/// Delay between startup and the manifest sweep
pub const DEFAULT_SYNC_INITIAL_DELAY_SECS: u64 = 10;

/// Pause between rovers during the sweep
pub const DEFAULT_SYNC_ROVER_PAUSE_SECS: u64 = 5;

// ============================================================================
// CORS / SERVER
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

/// Default listen port
pub const DEFAULT_API_PORT: u16 = 4000;

/// Development server URL
pub const DEV_SERVER_URL: &str = "http://localhost:4000";
