//! Service Layer
//!
//! Business logic between the HTTP/GraphQL surfaces and the upstream
//! client, freshness cache and persisted store. Services speak in core
//! errors; the route layer maps them to API errors.

mod apod_service;
mod neo_service;
mod rover_service;
mod sync_service;

pub use apod_service::*;
pub use neo_service::*;
pub use rover_service::*;
pub use sync_service::*;
