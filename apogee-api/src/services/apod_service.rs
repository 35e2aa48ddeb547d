//! APOD Service
//!
//! Astronomy Picture of the Day lookups, served from the persisted store
//! while fresh and refetched otherwise.

use std::sync::Arc;

use apogee_core::{
    dates_between, parse_date, validate_range, ApodRecord, ApogeeResult, ValidationError,
};
use apogee_storage::{FreshnessPolicy, ReadThroughCache, Store};
use chrono::{Duration, NaiveDate, Utc};

use crate::constants::{APOD_RECENT_WINDOW_DAYS, SPACE_IMAGE_KEYWORDS};
use crate::telemetry::metrics::with_metrics;
use crate::upstream::{ApodQuery, UpstreamSource};

/// Freshness cache key of the recent space-image list.
pub const RECENT_SPACE_IMAGES_KEY: &str = "apod:recent-space";

/// Largest `count` the APOD endpoint accepts.
pub const MAX_APOD_COUNT: u32 = 100;

/// Image entries with an HD rendition whose title or explanation mentions
/// a space keyword.
pub fn is_space_image(record: &ApodRecord) -> bool {
    if !record.is_image() || record.hdurl.is_none() {
        return false;
    }
    let title = record.title.to_lowercase();
    let explanation = record.explanation.to_lowercase();
    SPACE_IMAGE_KEYWORDS
        .iter()
        .any(|k| title.contains(k) || explanation.contains(k))
}

#[derive(Clone)]
pub struct ApodService {
    store: Arc<dyn Store>,
    upstream: Arc<dyn UpstreamSource>,
    cache: ReadThroughCache,
}

impl ApodService {
    pub fn new(
        store: Arc<dyn Store>,
        upstream: Arc<dyn UpstreamSource>,
        cache: ReadThroughCache,
    ) -> Self {
        Self {
            store,
            upstream,
            cache,
        }
    }

    fn policy(&self) -> FreshnessPolicy {
        self.cache.default_policy()
    }

    /// Space images from the last 30 days, cached as one list.
    pub async fn recent_space_images(&self) -> ApogeeResult<Vec<ApodRecord>> {
        let policy = self.policy();
        let read = self
            .cache
            .get_or_fetch(RECENT_SPACE_IMAGES_KEY, &policy, || async {
                let end = Utc::now().date_naive();
                let start = end - Duration::days(APOD_RECENT_WINDOW_DAYS);
                let records = self
                    .upstream
                    .fetch_apod_range(ApodQuery::range(start, end))
                    .await?;
                Ok(records.into_iter().filter(is_space_image).collect::<Vec<_>>())
            })
            .await?;
        with_metrics(|m| m.record_cache_lookup("apod_recent", read.was_cache_hit()));
        Ok(read.into_value())
    }

    /// The entry for `date`, or `None` when that day is not an image.
    pub async fn get_apod(&self, date: &str) -> ApogeeResult<Option<ApodRecord>> {
        let date = parse_date("date", date)?;
        let policy = self.policy();

        match self.store.get_apod(date).await {
            Ok(Some(stored)) if policy.is_fresh(stored.cached_at) => {
                with_metrics(|m| m.record_cache_lookup("apod", true));
                return Ok(Some(stored.into_value()));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(date = %date, error = %e, "Failed to read stored APOD entry, refetching");
            }
        }
        with_metrics(|m| m.record_cache_lookup("apod", false));

        let fetched = self.upstream.fetch_apod(date).await?;
        if let Some(record) = &fetched {
            self.persist(record).await;
        }
        Ok(fetched)
    }

    /// Image entries for a date range or a random `count`.
    ///
    /// With no arguments the range is today. A fully fresh stored range is
    /// served without an upstream call; `count` queries always go upstream.
    pub async fn get_apods(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
        count: Option<u32>,
    ) -> ApogeeResult<Vec<ApodRecord>> {
        let start = start_date.map(|s| parse_date("start_date", s)).transpose()?;
        let end = end_date.map(|s| parse_date("end_date", s)).transpose()?;

        if let Some(count) = count {
            if count == 0 || count > MAX_APOD_COUNT {
                return Err(ValidationError::InvalidRange {
                    field: "count".to_string(),
                    reason: format!("must be between 1 and {}", MAX_APOD_COUNT),
                }
                .into());
            }
            return self.fetch_and_persist(ApodQuery::count(count)).await;
        }

        let query = match (start, end) {
            (None, None) => {
                let today = Utc::now().date_naive();
                ApodQuery::range(today, today)
            }
            (Some(start), Some(end)) => {
                validate_range(start, end, None)?;
                if let Some(records) = self.fresh_range(start, end).await {
                    with_metrics(|m| m.record_cache_lookup("apod_range", true));
                    return Ok(records);
                }
                with_metrics(|m| m.record_cache_lookup("apod_range", false));
                ApodQuery::range(start, end)
            }
            (start, end) => ApodQuery {
                start_date: start,
                end_date: end,
                count: None,
            },
        };

        self.fetch_and_persist(query).await
    }

    /// Stored records for every day of `[start, end]`, if all are present and
    /// fresh. A failed read counts as a miss.
    async fn fresh_range(&self, start: NaiveDate, end: NaiveDate) -> Option<Vec<ApodRecord>> {
        let policy = self.policy();
        let stored = match self.store.apods_between(start, end).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(%start, %end, error = %e, "Failed to read stored APOD range, refetching");
                return None;
            }
        };
        let days = dates_between(start, end);
        let complete = days.len() == stored.len()
            && stored
                .iter()
                .zip(&days)
                .all(|(row, day)| row.value.date == *day && policy.is_fresh(row.cached_at));
        complete.then(|| stored.into_iter().map(|s| s.into_value()).collect())
    }

    async fn fetch_and_persist(&self, query: ApodQuery) -> ApogeeResult<Vec<ApodRecord>> {
        let records = self.upstream.fetch_apod_range(query).await?;
        for record in &records {
            self.persist(record).await;
        }
        Ok(records)
    }

    async fn persist(&self, record: &ApodRecord) {
        if let Err(e) = self.store.upsert_apod(record).await {
            tracing::warn!(date = %record.date, error = %e, "Failed to persist APOD entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apogee_core::ApogeeError;
    use apogee_storage::{InMemoryCache, InMemoryStore};
    use apogee_test_utils::{fixtures, FlakyStore};

    use crate::upstream::MockUpstream;

    fn service(upstream: Arc<MockUpstream>, store: Arc<InMemoryStore>) -> ApodService {
        let cache = ReadThroughCache::new(Arc::new(InMemoryCache::new()), FreshnessPolicy::default());
        ApodService::new(store, upstream, cache)
    }

    fn day(offset: i64) -> NaiveDate {
        Utc::now().date_naive() - Duration::days(offset)
    }

    #[test]
    fn test_space_image_filter() {
        let mut record = fixtures::apod_image(day(0), "The Orion Nebula");
        assert!(is_space_image(&record));

        record.hdurl = None;
        assert!(!is_space_image(&record));

        let plain = fixtures::apod_image(day(0), "A quiet harbour");
        assert!(!is_space_image(&plain));

        let video = fixtures::apod_video(day(0), "Galaxy flythrough");
        assert!(!is_space_image(&video));
    }

    #[tokio::test]
    async fn test_recent_space_images_cached() -> ApogeeResult<()> {
        let upstream = Arc::new(MockUpstream::new().with_apods(vec![
            fixtures::apod_image(day(1), "Comet over the desert"),
            fixtures::apod_image(day(2), "Portrait of a cat"),
            fixtures::apod_image(day(45), "Old galaxy"),
        ]));
        let svc = service(upstream.clone(), Arc::new(InMemoryStore::new()));

        let first = svc.recent_space_images().await?;
        let second = svc.recent_space_images().await?;
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
        assert_eq!(upstream.calls().apod_range, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_apod_persists_and_serves_fresh() -> ApogeeResult<()> {
        let date = day(3);
        let upstream = Arc::new(MockUpstream::new().with_apods(vec![fixtures::apod_image(date, "Moonrise")]));
        let store = Arc::new(InMemoryStore::new());
        let svc = service(upstream.clone(), store.clone());

        let key = date.format("%Y-%m-%d").to_string();
        let first = svc.get_apod(&key).await?;
        let second = svc.get_apod(&key).await?;
        assert_eq!(first.map(|r| r.title), Some("Moonrise".to_string()));
        assert!(second.is_some());
        assert_eq!(upstream.calls().apod, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_apod_video_day_is_none() -> ApogeeResult<()> {
        let date = day(4);
        let upstream = Arc::new(MockUpstream::new().with_apods(vec![fixtures::apod_video(date, "Sun in motion")]));
        let svc = service(upstream, Arc::new(InMemoryStore::new()));
        assert!(svc.get_apod(&date.format("%Y-%m-%d").to_string()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_get_apod_rejects_bad_date() {
        let upstream = Arc::new(MockUpstream::new());
        let svc = service(upstream.clone(), Arc::new(InMemoryStore::new()));
        let result = svc.get_apod("15/03/2024").await;
        assert!(matches!(result, Err(ApogeeError::Validation(_))));
        assert_eq!(upstream.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_range_served_from_store_once_complete() -> ApogeeResult<()> {
        let upstream = Arc::new(MockUpstream::new().with_apods(vec![
            fixtures::apod_image(day(6), "Star trails"),
            fixtures::apod_image(day(5), "Planet parade"),
        ]));
        let svc = service(upstream.clone(), Arc::new(InMemoryStore::new()));
        let start = day(6).format("%Y-%m-%d").to_string();
        let end = day(5).format("%Y-%m-%d").to_string();

        let first = svc.get_apods(Some(&start), Some(&end), None).await?;
        let second = svc.get_apods(Some(&start), Some(&end), None).await?;
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(upstream.calls().apod_range, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_range_validation() {
        let svc = service(Arc::new(MockUpstream::new()), Arc::new(InMemoryStore::new()));
        let reversed = svc
            .get_apods(Some("2024-03-10"), Some("2024-03-01"), None)
            .await;
        assert!(matches!(
            reversed,
            Err(ApogeeError::Validation(ValidationError::InvalidRange { .. }))
        ));
        let too_many = svc.get_apods(None, None, Some(101)).await;
        assert!(matches!(
            too_many,
            Err(ApogeeError::Validation(ValidationError::InvalidRange { .. }))
        ));
    }

    #[tokio::test]
    async fn test_store_read_failure_falls_through_to_upstream() -> ApogeeResult<()> {
        let upstream = Arc::new(MockUpstream::new().with_apods(vec![
            fixtures::apod_image(day(8), "Saturn at opposition"),
            fixtures::apod_image(day(7), "Lunar halo"),
        ]));
        let cache = ReadThroughCache::new(Arc::new(InMemoryCache::new()), FreshnessPolicy::default());
        let svc = ApodService::new(Arc::new(FlakyStore::new().failing_reads()), upstream.clone(), cache);

        let single = svc.get_apod(&day(8).format("%Y-%m-%d").to_string()).await?;
        assert_eq!(single.map(|r| r.title), Some("Saturn at opposition".to_string()));

        let start = day(8).format("%Y-%m-%d").to_string();
        let end = day(7).format("%Y-%m-%d").to_string();
        assert_eq!(svc.get_apods(Some(&start), Some(&end), None).await?.len(), 2);
        assert_eq!(svc.get_apods(Some(&start), Some(&end), None).await?.len(), 2);

        assert_eq!(upstream.calls().apod, 1);
        assert_eq!(upstream.calls().apod_range, 2);
        Ok(())
    }
}
