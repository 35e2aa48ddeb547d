//! Manifest Sync Background Task
//!
//! Shortly after startup, walks the configured rovers one by one and syncs
//! each manifest into the store. Rovers already checked today are skipped,
//! so restarts within a day cost no upstream calls.
//!
//! # Configuration
//!
//! ```rust
//! use apogee_api::jobs::ManifestSyncConfig;
//! use apogee_core::Rover;
//! use std::time::Duration;
//!
//! let config = ManifestSyncConfig {
//!     enabled: true,
//!     initial_delay: Duration::from_secs(10), // Let the server come up first
//!     rover_pause: Duration::from_secs(5),    // Spread upstream load
//!     rovers: Rover::ALL.to_vec(),
//! };
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use apogee_core::Rover;
use tokio::sync::watch;

use crate::constants::{DEFAULT_SYNC_INITIAL_DELAY_SECS, DEFAULT_SYNC_ROVER_PAUSE_SECS};
use crate::services::{ManifestSynchronizer, SyncMode};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the manifest sync background task.
#[derive(Debug, Clone)]
pub struct ManifestSyncConfig {
    /// Whether the task runs at all (default: true)
    pub enabled: bool,

    /// Delay between startup and the first rover (default: 10 seconds)
    pub initial_delay: Duration,

    /// Pause between consecutive rovers (default: 5 seconds)
    pub rover_pause: Duration,

    /// Rovers to sync, in order (default: all four)
    pub rovers: Vec<Rover>,
}

impl Default for ManifestSyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(DEFAULT_SYNC_INITIAL_DELAY_SECS),
            rover_pause: Duration::from_secs(DEFAULT_SYNC_ROVER_PAUSE_SECS),
            rovers: Rover::ALL.to_vec(),
        }
    }
}

impl ManifestSyncConfig {
    /// Create ManifestSyncConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `APOGEE_SYNC_ENABLED`: "false" disables the task (default: true)
    /// - `APOGEE_SYNC_INITIAL_DELAY_SECS`: Delay before the first rover (default: 10)
    /// - `APOGEE_SYNC_ROVER_PAUSE_SECS`: Pause between rovers (default: 5)
    /// - `APOGEE_SYNC_ROVERS`: Comma-separated rover names (default: all)
    pub fn from_env() -> Self {
        let enabled = std::env::var("APOGEE_SYNC_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let initial_delay = Duration::from_secs(
            std::env::var("APOGEE_SYNC_INITIAL_DELAY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SYNC_INITIAL_DELAY_SECS),
        );

        let rover_pause = Duration::from_secs(
            std::env::var("APOGEE_SYNC_ROVER_PAUSE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SYNC_ROVER_PAUSE_SECS),
        );

        let rovers = std::env::var("APOGEE_SYNC_ROVERS")
            .ok()
            .map(|s| parse_rover_list(&s))
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| Rover::ALL.to_vec());

        Self {
            enabled,
            initial_delay,
            rover_pause,
            rovers,
        }
    }

    /// Create a configuration for development/testing with no waits.
    pub fn development() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::ZERO,
            rover_pause: Duration::ZERO,
            rovers: Rover::ALL.to_vec(),
        }
    }
}

/// Known rover names from a comma-separated list; unknown names are logged and dropped.
fn parse_rover_list(list: &str) -> Vec<Rover> {
    let mut rovers = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match name.parse::<Rover>() {
            Ok(rover) if !rovers.contains(&rover) => rovers.push(rover),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring entry in APOGEE_SYNC_ROVERS"),
        }
    }
    rovers
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for one run of the sync task.
#[derive(Debug, Default)]
pub struct ManifestSyncMetrics {
    pub rovers_synced: AtomicU64,
    pub rovers_skipped: AtomicU64,
    pub rovers_failed: AtomicU64,
    pub periods_inserted: AtomicU64,
    pub periods_deleted: AtomicU64,
    pub period_failures: AtomicU64,
}

impl ManifestSyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> ManifestSyncSnapshot {
        ManifestSyncSnapshot {
            rovers_synced: self.rovers_synced.load(Ordering::Relaxed),
            rovers_skipped: self.rovers_skipped.load(Ordering::Relaxed),
            rovers_failed: self.rovers_failed.load(Ordering::Relaxed),
            periods_inserted: self.periods_inserted.load(Ordering::Relaxed),
            periods_deleted: self.periods_deleted.load(Ordering::Relaxed),
            period_failures: self.period_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of sync metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestSyncSnapshot {
    pub rovers_synced: u64,
    pub rovers_skipped: u64,
    pub rovers_failed: u64,
    pub periods_inserted: u64,
    pub periods_deleted: u64,
    pub period_failures: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Sleep for `duration` unless shutdown is signalled first. Returns whether
/// shutdown was requested.
async fn sleep_or_shutdown(duration: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    if *shutdown_rx.borrow() {
        return true;
    }
    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown_rx.changed() => match changed {
                Ok(()) if *shutdown_rx.borrow() => return true,
                Ok(()) => continue,
                // Sender gone: nobody can ask us to stop any more.
                Err(_) => {
                    (&mut sleep).await;
                    return false;
                }
            },
        }
    }
}

/// Run the sweep once and return its counters.
///
/// Each rover is synced in order; a failing rover is logged and the sweep
/// moves on. Shutdown is honoured during the initial delay and the pauses.
pub async fn manifest_sync_task(
    sync: ManifestSynchronizer,
    config: ManifestSyncConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<ManifestSyncMetrics> {
    let metrics = Arc::new(ManifestSyncMetrics::new());

    if !config.enabled {
        tracing::info!("Manifest sync task disabled");
        return metrics;
    }

    tracing::info!(
        initial_delay_secs = config.initial_delay.as_secs(),
        rover_pause_secs = config.rover_pause.as_secs(),
        rovers = ?config.rovers,
        "Manifest sync task scheduled"
    );

    if sleep_or_shutdown(config.initial_delay, &mut shutdown_rx).await {
        tracing::info!("Manifest sync task cancelled before start");
        return metrics;
    }

    for (index, rover) in config.rovers.iter().copied().enumerate() {
        if index > 0 && sleep_or_shutdown(config.rover_pause, &mut shutdown_rx).await {
            tracing::info!("Manifest sync task shutting down");
            break;
        }

        match sync.sync_rover(rover, SyncMode::IfStale).await {
            Ok(report) if report.skipped => {
                metrics.rovers_skipped.fetch_add(1, Ordering::Relaxed);
            }
            Ok(report) => {
                metrics.rovers_synced.fetch_add(1, Ordering::Relaxed);
                metrics
                    .periods_inserted
                    .fetch_add(report.inserted, Ordering::Relaxed);
                metrics
                    .periods_deleted
                    .fetch_add(report.deleted, Ordering::Relaxed);
                metrics
                    .period_failures
                    .fetch_add(report.failures.len() as u64, Ordering::Relaxed);
            }
            Err(e) => {
                metrics.rovers_failed.fetch_add(1, Ordering::Relaxed);
                crate::telemetry::metrics::with_metrics(|m| {
                    m.record_sync_run(rover.as_str(), "failed")
                });
                tracing::error!(rover = %rover, error = %e, "Manifest sync failed");
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        rovers_synced = snapshot.rovers_synced,
        rovers_skipped = snapshot.rovers_skipped,
        rovers_failed = snapshot.rovers_failed,
        periods_inserted = snapshot.periods_inserted,
        periods_deleted = snapshot.periods_deleted,
        period_failures = snapshot.period_failures,
        "Manifest sync task completed"
    );

    metrics
}

// ============================================================================
// TESTS
// ============================================================================
