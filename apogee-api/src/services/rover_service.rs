//! Rover Query Service
//!
//! The read façade over persisted rover manifests. Summary queries are
//! answered from the store alone; photo queries go upstream one sol at a
//! time.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use apogee_core::{ApogeeResult, ManifestRecord, PeriodKey, PeriodResult, Rover, ValidationError};
use apogee_storage::Store;

use crate::constants::MAX_SOLS_PER_REQUEST;
use crate::upstream::UpstreamSource;

/// Parse a user-supplied rover name. Unknown names never reach the store.
pub fn parse_rover(name: &str) -> ApogeeResult<Rover> {
    Ok(name.parse::<Rover>()?)
}

#[derive(Clone)]
pub struct RoverQueryService {
    store: Arc<dyn Store>,
    upstream: Arc<dyn UpstreamSource>,
    item_fetch_delay: Duration,
}

impl RoverQueryService {
    pub fn new(
        store: Arc<dyn Store>,
        upstream: Arc<dyn UpstreamSource>,
        item_fetch_delay: Duration,
    ) -> Self {
        Self {
            store,
            upstream,
            item_fetch_delay,
        }
    }

    /// Stored sols of `rover`. A failed read is logged and answers empty.
    async fn stored_periods(&self, rover: Rover) -> Vec<ManifestRecord> {
        match self.store.list_periods(rover).await {
            Ok(periods) => periods,
            Err(e) => {
                tracing::warn!(rover = %rover, error = %e, "Failed to read stored sols, answering empty");
                Vec::new()
            }
        }
    }

    /// Stored sols that have at least one photo, ascending.
    pub async fn get_periods_with_items(&self, rover: &str) -> ApogeeResult<Vec<PeriodKey>> {
        let rover = parse_rover(rover)?;
        let periods = self.stored_periods(rover).await;
        Ok(periods
            .iter()
            .filter(|r| r.has_items())
            .map(|r| r.period_key)
            .collect())
    }

    /// Cameras seen in the last reconciled manifest. Empty before the first sync.
    pub async fn get_categories_for(&self, rover: &str) -> ApogeeResult<Vec<String>> {
        let rover = parse_rover(rover)?;
        match self.store.get_profile(rover).await {
            Ok(profile) => Ok(profile
                .map(|p| p.known_categories.into_iter().collect())
                .unwrap_or_default()),
            Err(e) => {
                tracing::warn!(rover = %rover, error = %e, "Failed to read rover profile, answering empty");
                Ok(Vec::new())
            }
        }
    }

    /// Photos (or summaries) for the requested sols.
    ///
    /// Without explicit `periods` every stored sol with photos is summarised
    /// and nothing is fetched. With them, results follow request order and
    /// sols that are unknown, empty, or lack `category` are skipped. A failed
    /// photo fetch degrades to an empty list unless the failure is fatal.
    /// More than `MAX_SOLS_PER_REQUEST` sols is rejected before any read.
    pub async fn get_items_for_periods(
        &self,
        rover: &str,
        periods: Option<&[PeriodKey]>,
        category: Option<&str>,
        summary_only: bool,
    ) -> ApogeeResult<Vec<PeriodResult>> {
        let rover = parse_rover(rover)?;
        if let Some(periods) = periods.filter(|p| p.len() > MAX_SOLS_PER_REQUEST) {
            return Err(ValidationError::InvalidRange {
                field: "sols".to_string(),
                reason: format!(
                    "at most {} sols per request, got {}",
                    MAX_SOLS_PER_REQUEST,
                    periods.len()
                ),
            }
            .into());
        }
        let stored: BTreeMap<PeriodKey, ManifestRecord> = self
            .stored_periods(rover)
            .await
            .into_iter()
            .map(|r| (r.period_key, r))
            .collect();

        let wanted = |record: &ManifestRecord| {
            record.has_items() && category.map_or(true, |c| record.has_category(c))
        };

        let Some(periods) = periods else {
            return Ok(stored
                .values()
                .filter(|r| wanted(*r))
                .map(|r| PeriodResult::summary(r, category))
                .collect());
        };

        let selected: Vec<&ManifestRecord> = periods
            .iter()
            .filter_map(|p| stored.get(p))
            .filter(|r| wanted(*r))
            .collect();

        if summary_only {
            return Ok(selected
                .into_iter()
                .map(|r| PeriodResult::summary(r, category))
                .collect());
        }

        let mut results = Vec::with_capacity(selected.len());
        for (index, record) in selected.into_iter().enumerate() {
            if index > 0 && !self.item_fetch_delay.is_zero() {
                tokio::time::sleep(self.item_fetch_delay).await;
            }

            let items = match self
                .upstream
                .fetch_items(rover, record.period_key, category)
                .await
            {
                Ok(items) => items,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        rover = %rover,
                        sol = record.period_key,
                        error = %e,
                        "Photo fetch failed, returning empty sol"
                    );
                    Vec::new()
                }
            };

            let summary = PeriodResult::summary(record, category);
            results.push(PeriodResult {
                item_count: items.len() as u64,
                items,
                ..summary
            });
        }

        Ok(results)
    }
}
