//! Manifest Sync Service
//!
//! Fetches a rover manifest, reconciles it against the store and applies
//! the result one sol at a time. A sol that fails to persist is reported
//! and skipped; the rest of the sync carries on.

use std::sync::Arc;

use apogee_core::{reconcile, ApogeeError, ApogeeResult, PeriodKey, Rover, RoverProfile};
use apogee_storage::{FreshnessPolicy, ReadThroughCache, Store};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::telemetry::metrics::with_metrics;
use crate::upstream::UpstreamSource;

/// Freshness cache key of a rover's raw manifest.
pub fn manifest_cache_key(rover: Rover) -> String {
    format!("manifest:{}", rover)
}

/// Whether a sync may be skipped when the rover was already checked today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    IfStale,
    Force,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum PeriodAction {
    Insert,
    Delete,
}

/// One sol that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PeriodFailure {
    pub sol: PeriodKey,
    pub action: PeriodAction,
    pub reason: String,
}

impl PeriodFailure {
    pub fn to_error(&self, rover: Rover) -> ApogeeError {
        ApogeeError::PartialReconciliation {
            parent: rover.to_string(),
            period_key: self.sol,
            reason: self.reason.clone(),
        }
    }
}

/// Outcome of syncing one rover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SyncReport {
    pub rover: Rover,
    /// True when the rover was already checked today and nothing was fetched.
    pub skipped: bool,
    pub inserted: u64,
    pub deleted: u64,
    pub failures: Vec<PeriodFailure>,
}

impl SyncReport {
    fn skipped(rover: Rover) -> Self {
        Self {
            rover,
            skipped: true,
            inserted: 0,
            deleted: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone)]
pub struct ManifestSynchronizer {
    store: Arc<dyn Store>,
    upstream: Arc<dyn UpstreamSource>,
    cache: ReadThroughCache,
}

impl ManifestSynchronizer {
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

    /// Bring the stored manifest of `rover` up to date.
    ///
    /// Upstream failures and store failures outside the per-sol writes abort
    /// the sync; per-sol write failures land in [`SyncReport::failures`].
    pub async fn sync_rover(&self, rover: Rover, mode: SyncMode) -> ApogeeResult<SyncReport> {
        let today = Utc::now().date_naive();
        let profile = self
            .store
            .get_profile(rover)
            .await?
            .unwrap_or_else(|| RoverProfile::empty(rover));

        if mode == SyncMode::IfStale && profile.checked_on(today) {
            tracing::debug!(rover = %rover, "Rover already synced today, skipping");
            with_metrics(|m| m.record_sync_run(rover.as_str(), "skipped"));
            return Ok(SyncReport::skipped(rover));
        }

        let payload = self.upstream.fetch_manifest(rover).await?;
        let stored = self.store.list_periods(rover).await?;
        let plan = reconcile(rover, &payload.records, &stored);

        tracing::info!(
            rover = %rover,
            fetched = payload.records.len(),
            merged = plan.merged.len(),
            to_insert = plan.to_insert_or_update.len(),
            to_delete = plan.to_delete.len(),
            high_water_mark = ?plan.high_water_mark,
            "Reconciled rover manifest"
        );

        let mut report = SyncReport {
            rover,
            skipped: false,
            inserted: 0,
            deleted: 0,
            failures: Vec::new(),
        };

        for record in &plan.to_delete {
            match self.store.delete_period(rover, record.period_key).await {
                Ok(_) => report.deleted += 1,
                Err(e) => self.note_failure(&mut report, record.period_key, PeriodAction::Delete, e),
            }
        }

        for record in &plan.to_insert_or_update {
            match self.store.upsert_period(rover, record).await {
                Ok(()) => report.inserted += 1,
                Err(e) => self.note_failure(&mut report, record.period_key, PeriodAction::Insert, e),
            }
        }

        let updated = RoverProfile {
            rover,
            known_periods: plan.period_keys(),
            known_categories: plan.categories(),
            last_checked: Some(today),
            last_updated: Utc::now(),
        };
        self.store.put_profile(&updated).await?;

        if let Err(e) = self.cache.store(&manifest_cache_key(rover), &payload.raw).await {
            tracing::warn!(rover = %rover, error = %e, "Failed to cache raw manifest");
        }

        with_metrics(|m| {
            m.record_sync_periods(
                rover.as_str(),
                report.inserted,
                report.deleted,
                report.failures.len() as u64,
            );
            m.record_sync_run(rover.as_str(), "synced");
        });

        tracing::info!(
            rover = %rover,
            inserted = report.inserted,
            deleted = report.deleted,
            failures = report.failures.len(),
            "Rover manifest synced"
        );

        Ok(report)
    }

    /// The raw manifest cached by the last sync, when written today.
    pub async fn cached_manifest(&self, rover: Rover) -> ApogeeResult<Option<serde_json::Value>> {
        Ok(self
            .cache
            .get_fresh(&manifest_cache_key(rover), &FreshnessPolicy::CalendarDay)
            .await?
            .map(|read| read.into_value()))
    }

    fn note_failure(
        &self,
        report: &mut SyncReport,
        sol: PeriodKey,
        action: PeriodAction,
        err: ApogeeError,
    ) {
        let failure = PeriodFailure {
            sol,
            action,
            reason: err.to_string(),
        };
        tracing::warn!(
            rover = %report.rover,
            sol,
            action = ?action,
            error = %failure.to_error(report.rover),
            "Skipping sol that failed to persist"
        );
        report.failures.push(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apogee_core::{ManifestRecord, UpstreamError};
    use apogee_storage::{InMemoryCache, InMemoryStore, ManifestStore};
    use apogee_test_utils::FlakyStore;

    use crate::upstream::MockUpstream;

    fn cache() -> ReadThroughCache {
        ReadThroughCache::new(Arc::new(InMemoryCache::new()), FreshnessPolicy::default())
    }

    fn scenario_manifest() -> Vec<ManifestRecord> {
        vec![
            ManifestRecord::new(5, 3, ["A"]),
            ManifestRecord::new(5, 4, ["A", "B"]),
            ManifestRecord::new(7, 2, ["C"]),
        ]
    }

    #[tokio::test]
    async fn test_sync_applies_reconciliation() -> ApogeeResult<()> {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_period(Rover::Curiosity, &ManifestRecord::new(5, 7, ["A", "B"]))
            .await?;
        store
            .upsert_period(Rover::Curiosity, &ManifestRecord::new(3, 1, ["A"]))
            .await?;
        let upstream = Arc::new(MockUpstream::new().with_manifest(Rover::Curiosity, scenario_manifest()));
        let sync = ManifestSynchronizer::new(store.clone(), upstream.clone(), cache());

        let report = sync.sync_rover(Rover::Curiosity, SyncMode::IfStale).await?;
        assert!(!report.skipped);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.deleted, 1);
        assert!(report.is_clean());

        let sols: Vec<_> = store
            .list_periods(Rover::Curiosity)
            .await?
            .iter()
            .map(|r| r.period_key)
            .collect();
        assert_eq!(sols, vec![5, 7]);

        let Some(profile) = store.get_profile(Rover::Curiosity).await? else {
            panic!("profile should be written by sync");
        };
        assert_eq!(profile.known_periods, vec![5, 7]);
        assert_eq!(profile.known_categories.len(), 3);
        assert!(profile.checked_on(Utc::now().date_naive()));

        assert!(sync.cached_manifest(Rover::Curiosity).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_second_sync_same_day_is_skipped() -> ApogeeResult<()> {
        let store = Arc::new(InMemoryStore::new());
        let upstream = Arc::new(MockUpstream::new().with_manifest(Rover::Spirit, scenario_manifest()));
        let sync = ManifestSynchronizer::new(store, upstream.clone(), cache());

        sync.sync_rover(Rover::Spirit, SyncMode::IfStale).await?;
        let second = sync.sync_rover(Rover::Spirit, SyncMode::IfStale).await?;
        assert!(second.skipped);
        assert_eq!(upstream.calls().manifest, 1);

        let forced = sync.sync_rover(Rover::Spirit, SyncMode::Force).await?;
        assert!(!forced.skipped);
        // Nothing above the high-water mark, nothing missing.
        assert_eq!(forced.inserted, 0);
        assert_eq!(forced.deleted, 0);
        assert_eq!(upstream.calls().manifest, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_failing_sol_is_reported_and_skipped() -> ApogeeResult<()> {
        let store = Arc::new(FlakyStore::new().fail_upsert_for(7));
        let upstream = Arc::new(MockUpstream::new().with_manifest(
            Rover::Perseverance,
            vec![
                ManifestRecord::new(6, 1, ["A"]),
                ManifestRecord::new(7, 2, ["B"]),
                ManifestRecord::new(8, 3, ["C"]),
            ],
        ));
        let sync = ManifestSynchronizer::new(store.clone(), upstream, cache());

        let report = sync.sync_rover(Rover::Perseverance, SyncMode::IfStale).await?;
        assert_eq!(report.inserted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].sol, 7);
        assert_eq!(report.failures[0].action, PeriodAction::Insert);
        assert!(matches!(
            report.failures[0].to_error(Rover::Perseverance),
            ApogeeError::PartialReconciliation { period_key: 7, .. }
        ));

        let sols: Vec<_> = store
            .list_periods(Rover::Perseverance)
            .await?
            .iter()
            .map(|r| r.period_key)
            .collect();
        assert_eq!(sols, vec![6, 8]);
        Ok(())
    }

    #[tokio::test]
    async fn test_upstream_failure_aborts_without_writes() -> ApogeeResult<()> {
        let store = Arc::new(InMemoryStore::new());
        let upstream = Arc::new(MockUpstream::new().failing_with(UpstreamError::RateLimited {
            endpoint: "/mars-photos/api/v1/manifests/opportunity".to_string(),
            attempts: 3,
            retry_after_secs: 60,
        }));
        let sync = ManifestSynchronizer::new(store.clone(), upstream, cache());

        let result = sync.sync_rover(Rover::Opportunity, SyncMode::IfStale).await;
        assert!(matches!(
            result,
            Err(ApogeeError::Upstream(UpstreamError::RateLimited { .. }))
        ));
        assert!(store.get_profile(Rover::Opportunity).await?.is_none());
        Ok(())
    }
}
