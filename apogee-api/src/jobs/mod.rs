//! Background Jobs for APOGEE API
//!
//! - `manifest_sync`: one sweep over the rover manifests shortly after startup
//!
//! # Usage
//!
//! ```ignore
//! use apogee_api::jobs::{manifest_sync_task, ManifestSyncConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(manifest_sync_task(state.synchronizer.clone(), ManifestSyncConfig::from_env(), shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod manifest_sync;

pub use manifest_sync::{
    manifest_sync_task, ManifestSyncConfig, ManifestSyncMetrics, ManifestSyncSnapshot,
};
