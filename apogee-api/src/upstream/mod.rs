//! Upstream Client for the NASA open-data APIs.

pub mod client;
pub mod mock;
pub mod models;
pub mod source;

pub use client::{NasaClient, RetryPolicy};
pub use mock::{MockUpstream, UpstreamCalls};
pub use models::ManifestPayload;
pub use source::{ApodQuery, UpstreamSource};
