//! APOD REST API Routes

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use apogee_core::ApodRecord;

use crate::{
    error::{ApiError, ApiResult},
    services::ApodService,
    state::AppState,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct ApodQueryParams {
    /// First day, `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// Last day, `YYYY-MM-DD`
    pub end_date: Option<String>,
    /// Random entries instead of a range (1-100)
    pub count: Option<u32>,
}

/// GET /api/v1/apod/recent - Space images from the last 30 days
#[utoipa::path(
    get,
    path = "/api/v1/apod/recent",
    tag = "APOD",
    responses(
        (status = 200, description = "Space images with an HD rendition", body = Vec<ApodRecord>),
        (status = 429, description = "Upstream rate limit", body = ApiError),
        (status = 502, description = "Upstream failure", body = ApiError),
    ),
)]
pub async fn recent_space_images(
    State(apod): State<ApodService>,
) -> ApiResult<Json<Vec<ApodRecord>>> {
    Ok(Json(apod.recent_space_images().await?))
}

/// GET /api/v1/apod - Image entries for a range or a random count
#[utoipa::path(
    get,
    path = "/api/v1/apod",
    tag = "APOD",
    params(ApodQueryParams),
    responses(
        (status = 200, description = "Image entries", body = Vec<ApodRecord>),
        (status = 400, description = "Invalid date, range or count", body = ApiError),
        (status = 502, description = "Upstream failure", body = ApiError),
    ),
)]
pub async fn list_apods(
    State(apod): State<ApodService>,
    Query(params): Query<ApodQueryParams>,
) -> ApiResult<Json<Vec<ApodRecord>>> {
    let records = apod
        .get_apods(
            params.start_date.as_deref(),
            params.end_date.as_deref(),
            params.count,
        )
        .await?;
    Ok(Json(records))
}

/// GET /api/v1/apod/{date} - The entry for one day
#[utoipa::path(
    get,
    path = "/api/v1/apod/{date}",
    tag = "APOD",
    params(("date" = String, Path, description = "Day in YYYY-MM-DD")),
    responses(
        (status = 200, description = "Image entry", body = ApodRecord),
        (status = 400, description = "Invalid date", body = ApiError),
        (status = 404, description = "No image for that day", body = ApiError),
    ),
)]
pub async fn get_apod(
    State(apod): State<ApodService>,
    Path(date): Path<String>,
) -> ApiResult<Json<ApodRecord>> {
    apod.get_apod(&date)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No APOD image for {}", date)))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_apods))
        .route("/recent", get(recent_space_images))
        .route("/:date", get(get_apod))
}
