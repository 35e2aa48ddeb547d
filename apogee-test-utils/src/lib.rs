//! APOGEE Test Utilities
//!
//! Centralized test infrastructure for the APOGEE workspace:
//! - Proptest generators for manifest data
//! - A store that fails on chosen sols
//! - Test fixtures for APOD, NEO and manifest records
//! - A scripted HTTP server standing in for the NASA API

// Re-export core types for convenience
pub use apogee_core::{
    ApodRecord, ApogeeError, ApogeeResult, EstimatedDiameter, ManifestRecord, NeoRecord,
    PeriodKey, Rover, RoverPhoto, RoverProfile, Stamped, StorageError,
};
pub use apogee_storage::{InMemoryStore, ManifestStore, RecordStore, Store};

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;

// ============================================================================
// FLAKY STORE
// ============================================================================

/// In-memory store whose writes fail for selected sols, and whose reads
/// can be made to fail altogether.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    failing_upserts: HashSet<PeriodKey>,
    failing_deletes: HashSet<PeriodKey>,
    fail_reads: bool,
    fail_ping: bool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `upsert_period` fails for `sol` on every rover.
    pub fn fail_upsert_for(mut self, sol: PeriodKey) -> Self {
        self.failing_upserts.insert(sol);
        self
    }

    /// `delete_period` fails for `sol` on every rover.
    pub fn fail_delete_for(mut self, sol: PeriodKey) -> Self {
        self.failing_deletes.insert(sol);
        self
    }

    /// Every read (profiles, sols, APOD and NEO rows) fails. Writes still land.
    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// `ping` always fails.
    pub fn unreachable(mut self) -> Self {
        self.fail_ping = true;
        self
    }

    fn check_read(&self, what: &str) -> ApogeeResult<()> {
        if self.fail_reads {
            return Err(StorageError::TransactionFailed {
                reason: format!("injected read failure on {}", what),
            }
            .into());
        }
        Ok(())
    }

    fn write_failure(rover: Rover, sol: PeriodKey) -> ApogeeError {
        StorageError::TransactionFailed {
            reason: format!("injected write failure for {} sol {}", rover, sol),
        }
        .into()
    }
}

#[async_trait]
impl ManifestStore for FlakyStore {
    async fn get_profile(&self, rover: Rover) -> ApogeeResult<Option<RoverProfile>> {
        self.check_read("rovers")?;
        self.inner.get_profile(rover).await
    }

    async fn put_profile(&self, profile: &RoverProfile) -> ApogeeResult<()> {
        self.inner.put_profile(profile).await
    }

    async fn list_periods(&self, rover: Rover) -> ApogeeResult<Vec<ManifestRecord>> {
        self.check_read("sols")?;
        self.inner.list_periods(rover).await
    }

    async fn get_period(
        &self,
        rover: Rover,
        period_key: PeriodKey,
    ) -> ApogeeResult<Option<ManifestRecord>> {
        self.check_read("sols")?;
        self.inner.get_period(rover, period_key).await
    }

    async fn upsert_period(&self, rover: Rover, record: &ManifestRecord) -> ApogeeResult<()> {
        if self.failing_upserts.contains(&record.period_key) {
            return Err(Self::write_failure(rover, record.period_key));
        }
        self.inner.upsert_period(rover, record).await
    }

    async fn delete_period(&self, rover: Rover, period_key: PeriodKey) -> ApogeeResult<bool> {
        if self.failing_deletes.contains(&period_key) {
            return Err(Self::write_failure(rover, period_key));
        }
        self.inner.delete_period(rover, period_key).await
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn get_apod(&self, date: NaiveDate) -> ApogeeResult<Option<Stamped<ApodRecord>>> {
        self.check_read("apod")?;
        self.inner.get_apod(date).await
    }

    async fn upsert_apod(&self, record: &ApodRecord) -> ApogeeResult<()> {
        self.inner.upsert_apod(record).await
    }

    async fn apods_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApogeeResult<Vec<Stamped<ApodRecord>>> {
        self.check_read("apod")?;
        self.inner.apods_between(start, end).await
    }

    async fn upsert_neo(&self, record: &NeoRecord) -> ApogeeResult<()> {
        self.inner.upsert_neo(record).await
    }

    async fn neos_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApogeeResult<Vec<Stamped<NeoRecord>>> {
        self.check_read("neo")?;
        self.inner.neos_between(start, end).await
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn ping(&self) -> ApogeeResult<()> {
        if self.fail_ping {
            return Err(StorageError::OpenFailed {
                path: "flaky".to_string(),
                reason: "store marked unreachable".to_string(),
            }
            .into());
        }
        self.inner.ping().await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    pub const CAMERAS: &[&str] = &["FHAZ", "RHAZ", "MAST", "CHEMCAM", "NAVCAM", "PANCAM"];

    pub fn arb_rover() -> impl Strategy<Value = Rover> {
        prop::sample::select(Rover::ALL.to_vec())
    }

    pub fn arb_categories() -> impl Strategy<Value = Vec<String>> {
        prop::sample::subsequence(CAMERAS.to_vec(), 0..=3)
            .prop_map(|cams| cams.into_iter().map(str::to_string).collect())
    }

    /// A manifest line on a small sol range so duplicates show up often.
    pub fn arb_manifest_record() -> impl Strategy<Value = ManifestRecord> {
        (0u32..40, 0u64..50, arb_categories())
            .prop_map(|(sol, count, cats)| ManifestRecord::new(sol, count, cats))
    }

    /// An upstream manifest, unordered and possibly with repeated sols.
    pub fn arb_manifest(max_len: usize) -> impl Strategy<Value = Vec<ManifestRecord>> {
        prop::collection::vec(arb_manifest_record(), 0..=max_len)
    }

    /// A stored manifest: unique sols, ascending.
    pub fn arb_stored_manifest(max_len: usize) -> impl Strategy<Value = Vec<ManifestRecord>> {
        arb_manifest(max_len).prop_map(|mut records| {
            records.sort_by_key(|r| r.period_key);
            records.dedup_by_key(|r| r.period_key);
            records
        })
    }

    pub fn arb_date() -> impl Strategy<Value = NaiveDate> {
        (0i64..3650).prop_map(|offset| {
            NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default() + chrono::Duration::days(offset)
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use serde_json::{json, Value};

    /// An image entry with an HD rendition. Whether it counts as a space
    /// image depends on the words in `title` alone.
    pub fn apod_image(date: NaiveDate, title: &str) -> ApodRecord {
        ApodRecord {
            date,
            title: title.to_string(),
            url: format!("https://apod.nasa.gov/apod/image/{}.jpg", date.format("%y%m%d")),
            hdurl: Some(format!(
                "https://apod.nasa.gov/apod/image/{}_hd.jpg",
                date.format("%y%m%d")
            )),
            explanation: format!("Today's picture: {}.", title),
            media_type: "image".to_string(),
            service_version: Some("v1".to_string()),
            copyright: None,
        }
    }

    pub fn apod_video(date: NaiveDate, title: &str) -> ApodRecord {
        ApodRecord {
            url: format!("https://www.youtube.com/embed/{}", date.format("%y%m%d")),
            hdurl: None,
            media_type: "video".to_string(),
            ..apod_image(date, title)
        }
    }

    pub fn neo(id: &str, date: NaiveDate) -> NeoRecord {
        NeoRecord {
            id: id.to_string(),
            name: format!("({})", id),
            absolute_magnitude: Some(22.1),
            estimated_diameter: EstimatedDiameter {
                min: 0.1,
                max: 0.25,
            },
            is_potentially_hazardous: false,
            close_approach_date: date,
            miss_distance_km: 4_500_000.0,
            relative_velocity_kmh: 54_000.0,
            relative_velocity_kps: 15.0,
        }
    }

    pub fn photo(rover: Rover, sol: PeriodKey, camera: &str, id: u64) -> RoverPhoto {
        RoverPhoto {
            id,
            media_url: format!("https://mars.nasa.gov/raw/{}/{}/{}.jpg", rover, sol, id),
            captured_at: NaiveDate::from_ymd_opt(2021, 2, 18).unwrap_or_default(),
            category_tag: camera.to_string(),
            parent: rover,
            period_key: sol,
        }
    }

    /// Wire body of a manifest endpoint response.
    pub fn manifest_body(rover: Rover, records: &[ManifestRecord]) -> Value {
        json!({
            "photo_manifest": {
                "name": rover.as_str(),
                "max_sol": records.iter().map(|r| r.period_key).max(),
                "total_photos": records.iter().map(|r| r.item_count).sum::<u64>(),
                "photos": records.iter().map(|r| json!({
                    "sol": r.period_key,
                    "total_photos": r.item_count,
                    "cameras": r.categories,
                })).collect::<Vec<_>>(),
            }
        })
    }

    /// Wire body of an APOD range response.
    pub fn apod_body(records: &[ApodRecord]) -> Value {
        Value::Array(
            records
                .iter()
                .map(|r| {
                    json!({
                        "date": r.date.format("%Y-%m-%d").to_string(),
                        "title": r.title,
                        "url": r.url,
                        "hdurl": r.hdurl,
                        "explanation": r.explanation,
                        "media_type": r.media_type,
                        "service_version": r.service_version,
                    })
                })
                .collect(),
        )
    }
}

// ============================================================================
// SCRIPTED UPSTREAM SERVER
// ============================================================================

pub mod server {
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use axum::body::Body;
    use axum::extract::State;
    use axum::http::{header, StatusCode, Uri};
    use axum::response::{IntoResponse, Response};
    use axum::Router;
    use tokio::task::JoinHandle;

    /// One canned reply.
    #[derive(Debug, Clone)]
    pub struct ScriptedResponse {
        pub status: u16,
        pub retry_after: Option<String>,
        pub body: String,
    }

    impl ScriptedResponse {
        pub fn json(body: serde_json::Value) -> Self {
            Self {
                status: 200,
                retry_after: None,
                body: body.to_string(),
            }
        }

        /// A 429, with `Retry-After` set verbatim when given.
        pub fn too_many_requests(retry_after: Option<&str>) -> Self {
            Self {
                status: 429,
                retry_after: retry_after.map(str::to_string),
                body: r#"{"error":{"code":"OVER_RATE_LIMIT"}}"#.to_string(),
            }
        }

        pub fn status(status: u16, body: &str) -> Self {
            Self {
                status,
                retry_after: None,
                body: body.to_string(),
            }
        }
    }

    /// A request as the server saw it.
    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub uri: String,
        pub received_at: Instant,
    }

    struct Script {
        responses: Vec<ScriptedResponse>,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    /// Local HTTP server answering every request from a fixed script. The
    /// n-th request gets the n-th response; once the script runs out the
    /// last response repeats.
    pub struct ScriptedServer {
        addr: SocketAddr,
        script: Arc<Script>,
        handle: JoinHandle<()>,
    }

    impl ScriptedServer {
        pub async fn start(responses: Vec<ScriptedResponse>) -> std::io::Result<Self> {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
            let addr = listener.local_addr()?;
            let script = Arc::new(Script {
                responses,
                requests: Mutex::new(Vec::new()),
            });

            let app = Router::new().fallback(respond).with_state(script.clone());
            let handle = tokio::spawn(async move {
                let _ = axum::serve(listener, app).await;
            });

            Ok(Self {
                addr,
                script,
                handle,
            })
        }

        pub fn base_url(&self) -> String {
            format!("http://{}", self.addr)
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.script
                .requests
                .lock()
                .map(|log| log.clone())
                .unwrap_or_default()
        }

        pub fn hits(&self) -> usize {
            self.requests().len()
        }
    }

    impl Drop for ScriptedServer {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }

    async fn respond(State(script): State<Arc<Script>>, uri: Uri) -> Response {
        let index = match script.requests.lock() {
            Ok(mut log) => {
                log.push(RecordedRequest {
                    uri: uri.to_string(),
                    received_at: Instant::now(),
                });
                log.len() - 1
            }
            Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        };

        let Some(scripted) = script
            .responses
            .get(index)
            .or_else(|| script.responses.last())
        else {
            return StatusCode::NOT_FOUND.into_response();
        };

        let mut builder = Response::builder()
            .status(scripted.status)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(retry_after) = &scripted.retry_after {
            builder = builder.header(header::RETRY_AFTER, retry_after);
        }
        builder
            .body(Body::from(scripted.body.clone()))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

pub use server::{RecordedRequest, ScriptedResponse, ScriptedServer};
