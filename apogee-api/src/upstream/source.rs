//! The seam between the services and the NASA APIs.

use apogee_core::{ApodRecord, ApogeeResult, NeoRecord, PeriodKey, Rover, RoverPhoto};
use async_trait::async_trait;
use chrono::NaiveDate;

use super::models::ManifestPayload;

/// Parameters of an APOD range query. `count` takes precedence over the dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApodQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub count: Option<u32>,
}

impl ApodQuery {
    pub fn range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
            count: None,
        }
    }

    pub fn count(count: u32) -> Self {
        Self {
            count: Some(count),
            ..Self::default()
        }
    }

    /// Query-string pairs in the form the APOD endpoint expects.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        if let Some(count) = self.count {
            return vec![("count", count.to_string())];
        }
        let mut params = Vec::new();
        if let Some(start) = self.start_date {
            params.push(("start_date", start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = self.end_date {
            params.push(("end_date", end.format("%Y-%m-%d").to_string()));
        }
        params
    }
}

/// Read-only access to the NASA open-data APIs.
///
/// Implementations never touch the cache or the store. Every call either
/// returns decoded data or one of the upstream/config errors.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Full photo manifest of `rover`.
    async fn fetch_manifest(&self, rover: Rover) -> ApogeeResult<ManifestPayload>;

    /// Photos taken on `period_key`, optionally limited to one camera
    /// (matched by upstream, case-sensitive).
    async fn fetch_items(
        &self,
        rover: Rover,
        period_key: PeriodKey,
        category: Option<&str>,
    ) -> ApogeeResult<Vec<RoverPhoto>>;

    /// Image entries only.
    async fn fetch_apod_range(&self, query: ApodQuery) -> ApogeeResult<Vec<ApodRecord>>;

    /// `None` when the day's entry is not an image.
    async fn fetch_apod(&self, date: NaiveDate) -> ApogeeResult<Option<ApodRecord>>;

    /// Objects approaching within `[start, end]`, flattened across days.
    async fn fetch_neo_feed(&self, start: NaiveDate, end: NaiveDate) -> ApogeeResult<Vec<NeoRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_takes_precedence() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
        let query = ApodQuery {
            start_date: Some(start),
            end_date: Some(start),
            count: Some(5),
        };
        assert_eq!(query.to_params(), vec![("count", "5".to_string())]);
    }

    #[test]
    fn test_range_params() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
        let end = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap_or_default();
        assert_eq!(
            ApodQuery::range(start, end).to_params(),
            vec![
                ("start_date", "2024-01-01".to_string()),
                ("end_date", "2024-01-07".to_string())
            ]
        );
        assert!(ApodQuery::default().to_params().is_empty());
    }
}
