//! APOGEE API - REST/GraphQL Layer over the NASA Open-Data APIs
//!
//! This crate fronts the NASA APIs with a rate-limit aware client, keeps
//! rover manifests reconciled in a local store, and serves rover photos,
//! APOD and NEO data over REST (Axum) and GraphQL (async-graphql).

pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod macros;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod server;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod upstream;

// Re-export commonly used types
pub use config::{ApiConfig, NasaConfig, StoreBackend, StoreConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{manifest_sync_task, ManifestSyncConfig, ManifestSyncMetrics};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use services::{
    ApodService, ManifestSynchronizer, NeoService, RoverQueryService, SyncMode, SyncReport,
};
pub use state::AppState;
pub use upstream::{MockUpstream, NasaClient, UpstreamSource};
