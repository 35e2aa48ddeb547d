//! Mars Rover REST API Routes
//!
//! Read access to reconciled rover manifests plus a manual sync trigger.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use apogee_core::{PeriodKey, PeriodResult};

use crate::{
    constants::MAX_SOLS_PER_REQUEST,
    error::{ApiError, ApiResult},
    services::{parse_rover, ManifestSynchronizer, RoverQueryService, SyncMode, SyncReport},
    state::AppState,
};

// ============================================================================
// QUERY PARAMETERS
// ============================================================================

/// Query parameters of `GET /api/v1/rovers/{rover}/photos`.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct PhotosQuery {
    /// Camera name, matched case-sensitively
    pub camera: Option<String>,
    /// Comma-separated sol numbers, e.g. `1,2,3`
    pub sols: Option<String>,
    /// Return stored counts only, without fetching photos
    #[serde(default)]
    pub summary_only: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct SyncQuery {
    /// Sync even when the rover was already checked today
    #[serde(default)]
    pub force: bool,
}

/// Parse `1,2,3` into sols. A blank list means "not given"; more than
/// [`MAX_SOLS_PER_REQUEST`] entries is an invalid range.
pub fn parse_sol_list(raw: &str) -> ApiResult<Option<Vec<PeriodKey>>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let count = raw.split(',').count();
    if count > MAX_SOLS_PER_REQUEST {
        return Err(ApiError::invalid_range(format!(
            "Field 'sols' names {} sols, at most {} allowed",
            count, MAX_SOLS_PER_REQUEST
        )));
    }
    raw.split(',')
        .map(|s| {
            s.trim()
                .parse::<PeriodKey>()
                .map_err(|_| ApiError::invalid_format("sols", "comma-separated sol numbers"))
        })
        .collect::<ApiResult<Vec<_>>>()
        .map(Some)
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/rovers/{rover}/sols - Sols with at least one photo
#[utoipa::path(
    get,
    path = "/api/v1/rovers/{rover}/sols",
    tag = "Rovers",
    params(("rover" = String, Path, description = "curiosity, opportunity, spirit or perseverance")),
    responses(
        (status = 200, description = "Ascending sol numbers", body = Vec<u32>),
        (status = 400, description = "Unknown rover", body = ApiError),
    ),
)]
pub async fn list_sols(
    State(rovers): State<RoverQueryService>,
    Path(rover): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let sols = rovers.get_periods_with_items(&rover).await?;
    Ok(Json(sols))
}

/// GET /api/v1/rovers/{rover}/cameras - Cameras seen in the manifest
#[utoipa::path(
    get,
    path = "/api/v1/rovers/{rover}/cameras",
    tag = "Rovers",
    params(("rover" = String, Path, description = "curiosity, opportunity, spirit or perseverance")),
    responses(
        (status = 200, description = "Camera names, sorted", body = Vec<String>),
        (status = 400, description = "Unknown rover", body = ApiError),
    ),
)]
pub async fn list_cameras(
    State(rovers): State<RoverQueryService>,
    Path(rover): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let cameras = rovers.get_categories_for(&rover).await?;
    Ok(Json(cameras))
}

/// GET /api/v1/rovers/{rover}/photos - Photos or summaries per sol
#[utoipa::path(
    get,
    path = "/api/v1/rovers/{rover}/photos",
    tag = "Rovers",
    params(
        ("rover" = String, Path, description = "curiosity, opportunity, spirit or perseverance"),
        PhotosQuery,
    ),
    responses(
        (status = 200, description = "One entry per matching sol", body = Vec<PeriodResult>),
        (status = 400, description = "Invalid rover or sol list", body = ApiError),
        (status = 503, description = "Upstream API key missing or rejected", body = ApiError),
    ),
)]
pub async fn list_photos(
    State(rovers): State<RoverQueryService>,
    Path(rover): Path<String>,
    Query(params): Query<PhotosQuery>,
) -> ApiResult<Json<Vec<PeriodResult>>> {
    let sols = match params.sols.as_deref() {
        Some(raw) => parse_sol_list(raw)?,
        None => None,
    };
    let results = rovers
        .get_items_for_periods(
            &rover,
            sols.as_deref(),
            params.camera.as_deref(),
            params.summary_only,
        )
        .await?;
    Ok(Json(results))
}

/// POST /api/v1/rovers/{rover}/sync - Reconcile the manifest now
#[utoipa::path(
    post,
    path = "/api/v1/rovers/{rover}/sync",
    tag = "Rovers",
    params(
        ("rover" = String, Path, description = "curiosity, opportunity, spirit or perseverance"),
        SyncQuery,
    ),
    responses(
        (status = 200, description = "Sync outcome", body = SyncReport),
        (status = 400, description = "Unknown rover", body = ApiError),
        (status = 429, description = "Upstream still rate limiting", body = ApiError),
        (status = 502, description = "Upstream failure", body = ApiError),
    ),
)]
pub async fn sync_rover(
    State(sync): State<ManifestSynchronizer>,
    Path(rover): Path<String>,
    Query(params): Query<SyncQuery>,
) -> ApiResult<Json<SyncReport>> {
    let rover = parse_rover(&rover)?;
    let mode = if params.force {
        SyncMode::Force
    } else {
        SyncMode::IfStale
    };
    tracing::info!(rover = %rover, mode = ?mode, "Manual manifest sync requested");
    let report = sync.sync_rover(rover, mode).await?;
    Ok(Json(report))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/:rover/sols", get(list_sols))
        .route("/:rover/cameras", get(list_cameras))
        .route("/:rover/photos", get(list_photos))
        .route("/:rover/sync", post(sync_rover))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_parse_sol_list() {
        assert_eq!(parse_sol_list("1, 2,3").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(parse_sol_list("  ").unwrap(), None);
        assert_eq!(
            parse_sol_list("1,two").unwrap_err().code,
            ErrorCode::InvalidFormat
        );
        assert!(parse_sol_list("-4").is_err());
    }

    #[test]
    fn test_parse_sol_list_caps_length() {
        let at_cap = (1..=MAX_SOLS_PER_REQUEST).map(|n| n.to_string()).collect::<Vec<_>>().join(",");
        assert_eq!(parse_sol_list(&at_cap).unwrap().map(|v| v.len()), Some(MAX_SOLS_PER_REQUEST));

        let over_cap = format!("{},0", at_cap);
        let err = parse_sol_list(&over_cap).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRange);
        assert!(err.message.contains(&MAX_SOLS_PER_REQUEST.to_string()));
    }

    #[test]
    fn test_photos_query_defaults() {
        let query: PhotosQuery = serde_json::from_str("{}").unwrap();
        assert!(!query.summary_only);
        assert!(query.sols.is_none());
    }
}
