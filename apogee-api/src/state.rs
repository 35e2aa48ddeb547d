//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Duration;

use apogee_storage::{ReadThroughCache, Store};

use crate::routes::graphql::{create_schema, ApogeeSchema};
use crate::services::{ApodService, ManifestSynchronizer, NeoService, RoverQueryService};
use crate::upstream::UpstreamSource;

/// Application-wide state shared across all routes.
///
/// Every service holds the same store, upstream and cache handles, so
/// cloning the state is cheap.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub rovers: RoverQueryService,
    pub synchronizer: ManifestSynchronizer,
    pub apod: ApodService,
    pub neo: NeoService,
    pub graphql_schema: ApogeeSchema,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        upstream: Arc<dyn UpstreamSource>,
        cache: ReadThroughCache,
        item_fetch_delay: Duration,
    ) -> Self {
        let rovers = RoverQueryService::new(store.clone(), upstream.clone(), item_fetch_delay);
        let synchronizer = ManifestSynchronizer::new(store.clone(), upstream.clone(), cache.clone());
        let apod = ApodService::new(store.clone(), upstream.clone(), cache.clone());
        let neo = NeoService::new(store.clone(), upstream, cache.default_policy());
        let graphql_schema = create_schema(rovers.clone(), apod.clone(), neo.clone());

        Self {
            store,
            rovers,
            synchronizer,
            apod,
            neo,
            graphql_schema,
        }
    }
}

// Use macro to reduce boilerplate for FromRef implementations
crate::impl_from_ref!(RoverQueryService, rovers);
crate::impl_from_ref!(ManifestSynchronizer, synchronizer);
crate::impl_from_ref!(ApodService, apod);
crate::impl_from_ref!(NeoService, neo);
crate::impl_from_ref!(ApogeeSchema, graphql_schema);
