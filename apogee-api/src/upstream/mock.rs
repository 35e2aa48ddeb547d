//! In-process [`UpstreamSource`] with canned data and call counters.
//!
//! Used by unit and integration tests; never wired into the binary.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use apogee_core::{
    ApodRecord, ApogeeError, ApogeeResult, ManifestRecord, NeoRecord, PeriodKey, Rover,
    RoverPhoto, UpstreamError,
};
use async_trait::async_trait;
use chrono::NaiveDate;

use super::models::ManifestPayload;
use super::source::{ApodQuery, UpstreamSource};

/// Snapshot of how often each upstream operation was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpstreamCalls {
    pub manifest: u32,
    pub items: u32,
    pub apod_range: u32,
    pub apod: u32,
    pub neo_feed: u32,
}

impl UpstreamCalls {
    pub fn total(&self) -> u32 {
        self.manifest + self.items + self.apod_range + self.apod + self.neo_feed
    }
}

#[derive(Default)]
struct Counters {
    manifest: AtomicU32,
    items: AtomicU32,
    apod_range: AtomicU32,
    apod: AtomicU32,
    neo_feed: AtomicU32,
}

/// Canned upstream. Photos are generated (one per sol, camera `FHAZ` unless
/// a filter is given) unless set explicitly.
#[derive(Default)]
pub struct MockUpstream {
    manifests: HashMap<Rover, Vec<ManifestRecord>>,
    photos: HashMap<(Rover, PeriodKey), Vec<RoverPhoto>>,
    failing_sols: HashSet<PeriodKey>,
    apods: Vec<ApodRecord>,
    neos: Vec<NeoRecord>,
    fail_all: Option<ApogeeError>,
    counters: Counters,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manifest lines returned for `rover`, duplicates allowed.
    pub fn with_manifest(mut self, rover: Rover, records: Vec<ManifestRecord>) -> Self {
        self.manifests.insert(rover, records);
        self
    }

    pub fn with_photos(mut self, rover: Rover, sol: PeriodKey, photos: Vec<RoverPhoto>) -> Self {
        self.photos.insert((rover, sol), photos);
        self
    }

    /// Photo fetches for `sol` answer with a 500.
    pub fn with_failing_sol(mut self, sol: PeriodKey) -> Self {
        self.failing_sols.insert(sol);
        self
    }

    /// APOD entries of every media type; image filtering happens on read.
    pub fn with_apods(mut self, records: Vec<ApodRecord>) -> Self {
        self.apods = records;
        self
    }

    pub fn with_neos(mut self, records: Vec<NeoRecord>) -> Self {
        self.neos = records;
        self
    }

    /// Every call fails with `err`.
    pub fn failing_with(mut self, err: impl Into<ApogeeError>) -> Self {
        self.fail_all = Some(err.into());
        self
    }

    pub fn calls(&self) -> UpstreamCalls {
        UpstreamCalls {
            manifest: self.counters.manifest.load(Ordering::SeqCst),
            items: self.counters.items.load(Ordering::SeqCst),
            apod_range: self.counters.apod_range.load(Ordering::SeqCst),
            apod: self.counters.apod.load(Ordering::SeqCst),
            neo_feed: self.counters.neo_feed.load(Ordering::SeqCst),
        }
    }

    fn check(&self, counter: &AtomicU32) -> ApogeeResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        match &self.fail_all {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn generated_photo(rover: Rover, sol: PeriodKey, category: Option<&str>) -> RoverPhoto {
        RoverPhoto {
            id: u64::from(sol) * 1000 + 1,
            media_url: format!("https://mars.nasa.gov/msl-raw-images/{}/{}.jpg", rover, sol),
            captured_at: NaiveDate::from_ymd_opt(2012, 8, 6).unwrap_or_default(),
            category_tag: category.unwrap_or("FHAZ").to_string(),
            parent: rover,
            period_key: sol,
        }
    }
}

#[async_trait]
impl UpstreamSource for MockUpstream {
    async fn fetch_manifest(&self, rover: Rover) -> ApogeeResult<ManifestPayload> {
        self.check(&self.counters.manifest)?;
        let records = self.manifests.get(&rover).cloned().unwrap_or_default();
        let raw = serde_json::json!({
            "photo_manifest": {
                "name": rover.as_str(),
                "photos": records.iter().map(|r| serde_json::json!({
                    "sol": r.period_key,
                    "total_photos": r.item_count,
                    "cameras": r.categories,
                })).collect::<Vec<_>>(),
            }
        });
        Ok(ManifestPayload { records, raw })
    }

    async fn fetch_items(
        &self,
        rover: Rover,
        period_key: PeriodKey,
        category: Option<&str>,
    ) -> ApogeeResult<Vec<RoverPhoto>> {
        self.check(&self.counters.items)?;
        if self.failing_sols.contains(&period_key) {
            return Err(UpstreamError::RequestFailed {
                endpoint: format!("/mars-photos/api/v1/rovers/{}/photos", rover),
                status: 500,
                body: "Internal Server Error".to_string(),
            }
            .into());
        }
        Ok(match self.photos.get(&(rover, period_key)) {
            Some(photos) => photos
                .iter()
                .filter(|p| category.map_or(true, |c| p.category_tag == c))
                .cloned()
                .collect(),
            None => vec![Self::generated_photo(rover, period_key, category)],
        })
    }

    async fn fetch_apod_range(&self, query: ApodQuery) -> ApogeeResult<Vec<ApodRecord>> {
        self.check(&self.counters.apod_range)?;
        let images = self.apods.iter().filter(|r| r.is_image()).cloned();
        Ok(match query.count {
            Some(count) => images.take(count as usize).collect(),
            None => images
                .filter(|r| query.start_date.map_or(true, |s| r.date >= s))
                .filter(|r| query.end_date.map_or(true, |e| r.date <= e))
                .collect(),
        })
    }

    async fn fetch_apod(&self, date: NaiveDate) -> ApogeeResult<Option<ApodRecord>> {
        self.check(&self.counters.apod)?;
        Ok(self
            .apods
            .iter()
            .find(|r| r.date == date)
            .filter(|r| r.is_image())
            .cloned())
    }

    async fn fetch_neo_feed(&self, start: NaiveDate, end: NaiveDate) -> ApogeeResult<Vec<NeoRecord>> {
        self.check(&self.counters.neo_feed)?;
        Ok(self
            .neos
            .iter()
            .filter(|n| n.close_approach_date >= start && n.close_approach_date <= end)
            .cloned()
            .collect())
    }
}
