//! APOGEE API Server Entry Point
//!
//! Bootstraps configuration, opens the store and cache, spawns the manifest
//! sync job and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use apogee_api::server::{serve_until, shutdown_signal};
use apogee_api::telemetry::{init_tracer, TelemetryConfig};
use apogee_api::{
    create_api_router, manifest_sync_task, ApiConfig, ApiError, ApiResult, AppState,
    ManifestSyncConfig, NasaClient, NasaConfig, StoreBackend, StoreConfig, UpstreamSource,
};
use apogee_core::ApogeeError;
use apogee_storage::{
    CacheBackend, InMemoryCache, InMemoryStore, LmdbCache, LmdbStore, ReadThroughCache, Store,
};
use axum::Router;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let store_config = StoreConfig::from_env();
    let (store, cache_backend) = open_storage(&store_config)?;
    let cache = ReadThroughCache::new(cache_backend, store_config.freshness_policy());

    let nasa_config = NasaConfig::from_env();
    let upstream: Arc<dyn UpstreamSource> = Arc::new(NasaClient::new(&nasa_config)?);

    let state = AppState::new(store, upstream, cache, nasa_config.item_fetch_delay);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sync_job = tokio::spawn(manifest_sync_task(
        state.synchronizer.clone(),
        ManifestSyncConfig::from_env(),
        shutdown_rx,
    ));

    let api_config = ApiConfig::from_env();
    let app: Router = create_api_router(state, &api_config);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting APOGEE API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let served = serve_until(listener, app, shutdown_signal(), shutdown_tx).await;

    if let Err(e) = sync_job.await {
        tracing::warn!(error = %e, "Manifest sync task ended abnormally");
    }

    served
}

/// Open the store and cache backend selected by `config`.
///
/// With LMDB, the store and the cache live in sibling environments under
/// the configured directory.
fn open_storage(config: &StoreConfig) -> ApiResult<(Arc<dyn Store>, Arc<dyn CacheBackend>)> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok((Arc::new(InMemoryStore::new()), Arc::new(InMemoryCache::new())))
        }
        StoreBackend::Lmdb => {
            let root = Path::new(&config.path);
            let store = LmdbStore::new(root.join("store"), config.max_size_mb)
                .map_err(ApogeeError::from)?;
            let cache = LmdbCache::new(root.join("cache"), config.max_size_mb)
                .map_err(ApogeeError::from)?;
            tracing::info!(path = %config.path, max_size_mb = config.max_size_mb, "Opened LMDB store");
            Ok((Arc::new(store), Arc::new(cache)))
        }
    }
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("APOGEE_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("APOGEE_API_PORT").ok())
        .unwrap_or_else(|| apogee_api::constants::DEFAULT_API_PORT.to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
