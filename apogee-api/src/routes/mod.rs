//! REST and GraphQL Routes Module
//!
//! Includes:
//! - Rover manifest, photo and sync routes under /api/v1/rovers
//! - APOD and NEO routes under /api/v1
//! - GraphQL endpoint and GraphiQL at /graphql
//! - Health check endpoints (Kubernetes-compatible)
//! - CORS support for browser-based clients

pub mod apod;
pub mod graphql;
pub mod health;
pub mod neo;
pub mod rovers;

use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

// Re-export route creation functions for convenience
pub use apod::create_router as apod_router;
pub use graphql::create_router as graphql_router;
pub use health::create_router as health_router;
pub use neo::create_router as neo_router;
pub use rovers::create_router as rovers_router;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

/// Handler for /openapi.json endpoint.
#[cfg(feature = "openapi")]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([HeaderName::from_static("retry-after")])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the complete API router.
///
/// - Rover routes under /api/v1/rovers/*
/// - APOD under /api/v1/apod/* plus the legacy /api/apod/last7days
/// - NEO feed at /api/v1/neo
/// - GraphQL at /graphql
/// - Health checks at /health/*
/// - Metrics at /metrics
/// - OpenAPI spec at /openapi.json
///
/// # Middleware Order (outer to inner)
/// 1. CORS - handles preflight requests
/// 2. TraceLayer - tower-http request spans
/// 3. Observability - metrics and completion logs
pub fn create_api_router(state: AppState, api_config: &ApiConfig) -> Router {
    let api_routes = Router::new()
        .nest("/rovers", rovers::create_router())
        .nest("/apod", apod::create_router())
        .nest("/neo", neo::create_router());

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .route("/api/apod/last7days", get(apod::recent_space_images))
        .nest("/graphql", graphql::create_router())
        .with_state(state.clone())
        .nest("/health", health::create_router(state.store.clone()))
        .route("/metrics", get(metrics_handler));

    #[cfg(feature = "openapi")]
    {
        router = router.route("/openapi.json", get(openapi_json));
    }

    router
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(api_config))
}
