//! OpenAPI Specification for APOGEE API
//!
//! This module defines the OpenAPI document for the APOGEE REST API.
//! It uses utoipa to generate the OpenAPI specification from Rust types
//! and route annotations. GraphQL is self-describing and not included.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{apod, health, neo, rovers};
use crate::services::{PeriodAction, PeriodFailure, SyncReport};

use apogee_core::{ApodRecord, EstimatedDiameter, NeoRecord, PeriodResult, Rover, RoverPhoto};

/// OpenAPI document for APOGEE API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "APOGEE API",
        version = "0.4.0",
        description = "Caching proxy and sync layer in front of the NASA open-data APIs",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
        contact(name = "APOGEE", url = "https://apogee.run")
    ),
    servers(
        (url = "http://localhost:4000", description = "Local Development")
    ),
    tags(
        (name = "Rovers", description = "Reconciled Mars rover manifests and photos"),
        (name = "APOD", description = "Astronomy Picture of the Day"),
        (name = "NEO", description = "Near-earth object feed"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        // Rovers
        rovers::list_sols,
        rovers::list_cameras,
        rovers::list_photos,
        rovers::sync_rover,

        // APOD
        apod::recent_space_images,
        apod::list_apods,
        apod::get_apod,

        // NEO
        neo::list_neos,

        // Health
        health::ping,
        health::liveness,
        health::readiness,

        // Observability
        crate::telemetry::metrics::metrics_handler,
    ),
    components(
        schemas(
            // === Errors ===
            ApiError, ErrorCode,

            // === Rovers ===
            Rover, RoverPhoto, PeriodResult, SyncReport, PeriodFailure, PeriodAction,

            // === APOD / NEO ===
            ApodRecord, NeoRecord, EstimatedDiameter,

            // === Health ===
            HealthResponse, HealthStatus, HealthDetails, ComponentHealth
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        let openapi = Self::openapi();
        serde_json::to_string_pretty(&openapi)
    }
}
