//! NEO Service
//!
//! Near-earth object feed lookups over at most a week.

use std::sync::Arc;

use apogee_core::{parse_date, validate_range, ApogeeResult, NeoRecord};
use apogee_storage::{FreshnessPolicy, Store};
use chrono::{Duration, NaiveDate, Utc};

use crate::constants::{NEO_DEFAULT_SPAN_DAYS, NEO_MAX_SPAN_DAYS};
use crate::telemetry::metrics::with_metrics;
use crate::upstream::UpstreamSource;

#[derive(Clone)]
pub struct NeoService {
    store: Arc<dyn Store>,
    upstream: Arc<dyn UpstreamSource>,
    policy: FreshnessPolicy,
}

impl NeoService {
    pub fn new(
        store: Arc<dyn Store>,
        upstream: Arc<dyn UpstreamSource>,
        policy: FreshnessPolicy,
    ) -> Self {
        Self {
            store,
            upstream,
            policy,
        }
    }

    /// Objects approaching within `[start_date, end_date]`, ordered by date then id.
    ///
    /// The stored rows answer as long as any of them is still fresh.
    pub async fn get_neos(&self, start_date: &str, end_date: &str) -> ApogeeResult<Vec<NeoRecord>> {
        let start = parse_date("start_date", start_date)?;
        let end = parse_date("end_date", end_date)?;
        self.neos_between(start, end).await
    }

    /// Like [`get_neos`](Self::get_neos) with defaults: today, and six days
    /// after the start.
    pub async fn neo_feed(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> ApogeeResult<Vec<NeoRecord>> {
        let start = match start_date {
            Some(s) => parse_date("start_date", s)?,
            None => Utc::now().date_naive(),
        };
        let end = match end_date {
            Some(s) => parse_date("end_date", s)?,
            None => start + Duration::days(NEO_DEFAULT_SPAN_DAYS),
        };
        self.neos_between(start, end).await
    }

    async fn neos_between(&self, start: NaiveDate, end: NaiveDate) -> ApogeeResult<Vec<NeoRecord>> {
        validate_range(start, end, Some(NEO_MAX_SPAN_DAYS))?;

        let stored = match self.store.neos_between(start, end).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(%start, %end, error = %e, "Failed to read stored NEO rows, refetching");
                Vec::new()
            }
        };
        if stored.iter().any(|row| self.policy.is_fresh(row.cached_at)) {
            with_metrics(|m| m.record_cache_lookup("neo", true));
            return Ok(stored.into_iter().map(|row| row.into_value()).collect());
        }
        with_metrics(|m| m.record_cache_lookup("neo", false));

        let mut fetched = self.upstream.fetch_neo_feed(start, end).await?;
        for record in &fetched {
            if let Err(e) = self.store.upsert_neo(record).await {
                tracing::warn!(neo_id = %record.id, error = %e, "Failed to persist NEO entry");
            }
        }
        fetched.sort_by(|a, b| {
            a.close_approach_date
                .cmp(&b.close_approach_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apogee_core::{ApogeeError, ValidationError};
    use apogee_storage::InMemoryStore;
    use apogee_test_utils::{fixtures, FlakyStore};

    use crate::upstream::MockUpstream;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_default()
    }

    fn service(upstream: Arc<MockUpstream>) -> NeoService {
        NeoService::new(Arc::new(InMemoryStore::new()), upstream, FreshnessPolicy::default())
    }

    #[tokio::test]
    async fn test_fetch_then_serve_from_store() -> ApogeeResult<()> {
        let upstream = Arc::new(MockUpstream::new().with_neos(vec![
            fixtures::neo("3", date("2024-03-02")),
            fixtures::neo("1", date("2024-03-01")),
            fixtures::neo("9", date("2024-04-01")),
        ]));
        let svc = service(upstream.clone());

        let first = svc.get_neos("2024-03-01", "2024-03-07").await?;
        let ids: Vec<_> = first.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);

        let second = svc.get_neos("2024-03-01", "2024-03-07").await?;
        assert_eq!(first, second);
        assert_eq!(upstream.calls().neo_feed, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_span_longer_than_a_week_rejected() {
        let upstream = Arc::new(MockUpstream::new());
        let svc = service(upstream.clone());

        let ok_span = svc.get_neos("2024-03-01", "2024-03-08").await;
        assert!(ok_span.is_ok());

        let too_long = svc.get_neos("2024-03-01", "2024-03-09").await;
        assert!(matches!(
            too_long,
            Err(ApogeeError::Validation(ValidationError::InvalidRange { .. }))
        ));
        let reversed = svc.get_neos("2024-03-05", "2024-03-01").await;
        assert!(matches!(reversed, Err(ApogeeError::Validation(_))));
        assert_eq!(upstream.calls().neo_feed, 1);
    }

    #[tokio::test]
    async fn test_feed_defaults_to_week_from_start() -> ApogeeResult<()> {
        let upstream = Arc::new(MockUpstream::new().with_neos(vec![
            fixtures::neo("1", date("2024-03-07")),
            fixtures::neo("2", date("2024-03-08")),
        ]));
        let svc = service(upstream);
        let feed = svc.neo_feed(Some("2024-03-01"), None).await?;
        let ids: Vec<_> = feed.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_store_read_failure_falls_through_to_upstream() -> ApogeeResult<()> {
        let upstream = Arc::new(MockUpstream::new().with_neos(vec![fixtures::neo("7", date("2024-03-03"))]));
        let svc = NeoService::new(
            Arc::new(FlakyStore::new().failing_reads()),
            upstream.clone(),
            FreshnessPolicy::default(),
        );

        let neos = svc.get_neos("2024-03-01", "2024-03-07").await?;
        assert_eq!(neos.len(), 1);
        assert_eq!(upstream.calls().neo_feed, 1);
        Ok(())
    }
}
