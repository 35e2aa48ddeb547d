//! GraphQL API Routes
//!
//! A read-only Query root over the same services as the REST routes.
//!
//! Endpoints:
//! - POST /graphql - Execute GraphQL queries
//! - GET /graphql - GraphiQL playground

use async_graphql::{
    Context, EmptyMutation, EmptySubscription, ErrorExtensions, Object, Result as GqlResult,
    Schema, SimpleObject,
};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};

use apogee_core::{ApodRecord, NeoRecord, PeriodKey, PeriodResult, RoverPhoto};

use crate::{
    constants::DEFAULT_ROVER,
    error::ApiError,
    services::{ApodService, NeoService, RoverQueryService},
    state::AppState,
};

// ============================================================================
// ERROR CONVERSION
// ============================================================================

/// Turn any service error into a GraphQL error carrying the REST `code`.
pub fn to_gql_error(err: impl Into<ApiError>) -> async_graphql::Error {
    let api: ApiError = err.into();
    let code = serde_json::to_value(api.code)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| api.code.to_string());
    let retry_after = api.retry_after_secs();
    async_graphql::Error::new(api.message).extend_with(|_, e| {
        e.set("code", code);
        if let Some(secs) = retry_after {
            e.set("retryAfterSecs", secs);
        }
    })
}

// ============================================================================
// GRAPHQL TYPES
// ============================================================================

/// A single rover photo.
#[derive(Debug, Clone, SimpleObject)]
pub struct PhotoObject {
    pub id: String,
    #[graphql(name = "img_src")]
    pub img_src: String,
    #[graphql(name = "earth_date")]
    pub earth_date: String,
    pub sol: PeriodKey,
    pub camera: String,
    pub rover: String,
}

impl From<RoverPhoto> for PhotoObject {
    fn from(p: RoverPhoto) -> Self {
        Self {
            id: p.id.to_string(),
            img_src: p.media_url,
            earth_date: p.captured_at.format("%Y-%m-%d").to_string(),
            sol: p.period_key,
            camera: p.category_tag,
            rover: p.parent.as_str().to_string(),
        }
    }
}

/// Photos (or just the count) of one sol.
#[derive(Debug, Clone, SimpleObject)]
pub struct SolPhotosObject {
    pub sol: PeriodKey,
    pub photo_count: u64,
    pub camera: Option<String>,
    pub photos: Vec<PhotoObject>,
}

impl From<PeriodResult> for SolPhotosObject {
    fn from(r: PeriodResult) -> Self {
        Self {
            sol: r.period_key,
            photo_count: r.item_count,
            camera: r.category,
            photos: r.items.into_iter().map(PhotoObject::from).collect(),
        }
    }
}

/// NASA Astronomy Picture of the Day
#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "APOD")]
pub struct ApodObject {
    pub date: String,
    pub title: String,
    pub url: String,
    pub hdurl: Option<String>,
    pub explanation: String,
    pub media_type: String,
    pub service_version: Option<String>,
    pub copyright: Option<String>,
}

impl From<ApodRecord> for ApodObject {
    fn from(r: ApodRecord) -> Self {
        Self {
            date: r.date.format("%Y-%m-%d").to_string(),
            title: r.title,
            url: r.url,
            hdurl: r.hdurl,
            explanation: r.explanation,
            media_type: r.media_type,
            service_version: r.service_version,
            copyright: r.copyright,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct EstimatedDiameterObject {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct MissDistanceObject {
    pub kilometers: f64,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct RelativeVelocityObject {
    pub km_per_hour: f64,
}

/// NASA Near Earth Object
#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "NEO")]
pub struct NeoObject {
    pub id: String,
    pub name: String,
    pub absolute_magnitude: Option<f64>,
    pub estimated_diameter: EstimatedDiameterObject,
    pub is_potentially_hazardous: bool,
    pub close_approach_date: String,
    pub miss_distance: MissDistanceObject,
    pub relative_velocity: RelativeVelocityObject,
}

impl From<NeoRecord> for NeoObject {
    fn from(n: NeoRecord) -> Self {
        Self {
            id: n.id,
            name: n.name,
            absolute_magnitude: n.absolute_magnitude,
            estimated_diameter: EstimatedDiameterObject {
                min: n.estimated_diameter.min,
                max: n.estimated_diameter.max,
            },
            is_potentially_hazardous: n.is_potentially_hazardous,
            close_approach_date: n.close_approach_date.format("%Y-%m-%d").to_string(),
            miss_distance: MissDistanceObject {
                kilometers: n.miss_distance_km,
            },
            relative_velocity: RelativeVelocityObject {
                km_per_hour: n.relative_velocity_kmh,
            },
        }
    }
}

/// Flat NEO entry for feed views. `diameter` is the upper estimate in km.
#[derive(Debug, Clone, SimpleObject)]
pub struct NeoFeedEntry {
    pub id: String,
    pub name: String,
    pub approach_date: String,
    pub diameter: f64,
    pub is_hazardous: bool,
    pub miss_distance_km: f64,
    pub velocity_kps: f64,
}

impl From<NeoRecord> for NeoFeedEntry {
    fn from(n: NeoRecord) -> Self {
        Self {
            id: n.id,
            name: n.name,
            approach_date: n.close_approach_date.format("%Y-%m-%d").to_string(),
            diameter: n.estimated_diameter.max,
            is_hazardous: n.is_potentially_hazardous,
            miss_distance_km: n.miss_distance_km,
            velocity_kps: n.relative_velocity_kps,
        }
    }
}

// ============================================================================
// QUERY ROOT
// ============================================================================

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Photos or per-sol summaries for a rover, curiosity when omitted.
    /// Without `solRange` every stored sol is summarised.
    async fn mars_rover_photos(
        &self,
        ctx: &Context<'_>,
        rover: Option<String>,
        camera: Option<String>,
        sol_range: Option<Vec<PeriodKey>>,
        #[graphql(default = false)] summary_only: bool,
    ) -> GqlResult<Vec<SolPhotosObject>> {
        let rovers = ctx.data::<RoverQueryService>()?;
        let rover = rover.as_deref().unwrap_or(DEFAULT_ROVER);
        let results = rovers
            .get_items_for_periods(rover, sol_range.as_deref(), camera.as_deref(), summary_only)
            .await
            .map_err(to_gql_error)?;
        Ok(results.into_iter().map(SolPhotosObject::from).collect())
    }

    /// Sols with at least one photo, ascending.
    async fn available_sols(&self, ctx: &Context<'_>, rover: String) -> GqlResult<Vec<PeriodKey>> {
        let rovers = ctx.data::<RoverQueryService>()?;
        rovers
            .get_periods_with_items(&rover)
            .await
            .map_err(to_gql_error)
    }

    /// Cameras seen in the rover's manifest.
    async fn available_cameras(&self, ctx: &Context<'_>, rover: String) -> GqlResult<Vec<String>> {
        let rovers = ctx.data::<RoverQueryService>()?;
        rovers.get_categories_for(&rover).await.map_err(to_gql_error)
    }

    /// Space images from the last 30 days.
    async fn apod_images(&self, ctx: &Context<'_>) -> GqlResult<Vec<ApodObject>> {
        let apod = ctx.data::<ApodService>()?;
        let records = apod.recent_space_images().await.map_err(to_gql_error)?;
        Ok(records.into_iter().map(ApodObject::from).collect())
    }

    /// Astronomy Pictures of the Day for a date range. If no dates are
    /// provided, returns today's entry.
    #[graphql(name = "getAPODs")]
    async fn get_apods(
        &self,
        ctx: &Context<'_>,
        start_date: Option<String>,
        end_date: Option<String>,
        count: Option<u32>,
    ) -> GqlResult<Vec<ApodObject>> {
        let apod = ctx.data::<ApodService>()?;
        let records = apod
            .get_apods(start_date.as_deref(), end_date.as_deref(), count)
            .await
            .map_err(to_gql_error)?;
        Ok(records.into_iter().map(ApodObject::from).collect())
    }

    /// A single APOD for a specific date.
    #[graphql(name = "getAPOD")]
    async fn get_apod(&self, ctx: &Context<'_>, date: String) -> GqlResult<Option<ApodObject>> {
        let apod = ctx.data::<ApodService>()?;
        let record = apod.get_apod(&date).await.map_err(to_gql_error)?;
        Ok(record.map(ApodObject::from))
    }

    /// Near Earth Objects for a date range (max 7 days).
    #[graphql(name = "getNEOs")]
    async fn get_neos(
        &self,
        ctx: &Context<'_>,
        start_date: String,
        end_date: String,
    ) -> GqlResult<Vec<NeoObject>> {
        let neo = ctx.data::<NeoService>()?;
        let records = neo
            .get_neos(&start_date, &end_date)
            .await
            .map_err(to_gql_error)?;
        Ok(records.into_iter().map(NeoObject::from).collect())
    }

    /// Flat NEO feed; defaults to today and the six days after.
    async fn neo_feed(
        &self,
        ctx: &Context<'_>,
        start_date: Option<String>,
        end_date: Option<String>,
    ) -> GqlResult<Vec<NeoFeedEntry>> {
        let neo = ctx.data::<NeoService>()?;
        let records = neo
            .neo_feed(start_date.as_deref(), end_date.as_deref())
            .await
            .map_err(to_gql_error)?;
        Ok(records.into_iter().map(NeoFeedEntry::from).collect())
    }

    async fn health(&self) -> String {
        "OK".to_string()
    }
}

// ============================================================================
// SCHEMA & HANDLERS
// ============================================================================

/// The GraphQL schema type.
pub type ApogeeSchema = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

/// Create the GraphQL schema.
pub fn create_schema(
    rovers: RoverQueryService,
    apod: ApodService,
    neo: NeoService,
) -> ApogeeSchema {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .data(rovers)
        .data(apod)
        .data(neo)
        .finish()
}

/// Handler for GraphQL requests.
pub async fn graphql_handler(
    State(schema): State<ApogeeSchema>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

/// Handler for GraphiQL playground.
pub async fn graphiql_handler() -> impl IntoResponse {
    Html(
        async_graphql::http::GraphiQLSource::build()
            .endpoint("/graphql")
            .finish(),
    )
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the GraphQL routes router.
pub fn create_router() -> Router<AppState> {
    Router::new().route("/", get(graphiql_handler).post(graphql_handler))
}
