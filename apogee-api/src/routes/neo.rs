//! Near-Earth Object REST API Routes

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use apogee_core::NeoRecord;

use crate::{
    error::{ApiError, ApiResult},
    services::NeoService,
    state::AppState,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct NeoQueryParams {
    /// First day, `YYYY-MM-DD` (default: today)
    pub start_date: Option<String>,
    /// Last day, `YYYY-MM-DD` (default: six days after the start)
    pub end_date: Option<String>,
}

/// GET /api/v1/neo - Objects approaching within a window of at most a week
#[utoipa::path(
    get,
    path = "/api/v1/neo",
    tag = "NEO",
    params(NeoQueryParams),
    responses(
        (status = 200, description = "Objects ordered by approach date", body = Vec<NeoRecord>),
        (status = 400, description = "Invalid dates or window longer than 7 days", body = ApiError),
        (status = 502, description = "Upstream failure", body = ApiError),
    ),
)]
pub async fn list_neos(
    State(neo): State<NeoService>,
    Query(params): Query<NeoQueryParams>,
) -> ApiResult<Json<Vec<NeoRecord>>> {
    let records = match (params.start_date.as_deref(), params.end_date.as_deref()) {
        (Some(start), Some(end)) => neo.get_neos(start, end).await?,
        (start, end) => neo.neo_feed(start, end).await?,
    };
    Ok(Json(records))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/", get(list_neos))
}
