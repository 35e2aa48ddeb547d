//! Persisted store traits.
//!
//! The store owns all durable state: rover profiles, per-sol manifest
//! records, APOD entries and NEO entries. Every write is insert-or-replace
//! on the natural key, so concurrent writers only race to the same value.

use apogee_core::{
    ApodRecord, ApogeeResult, ManifestRecord, NeoRecord, PeriodKey, Rover, RoverProfile, Stamped,
};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Rover profiles and their per-sol manifest records.
#[async_trait]
pub trait ManifestStore: Send + Sync {
    async fn get_profile(&self, rover: Rover) -> ApogeeResult<Option<RoverProfile>>;

    async fn put_profile(&self, profile: &RoverProfile) -> ApogeeResult<()>;

    /// All stored records of `rover`, ascending by sol.
    async fn list_periods(&self, rover: Rover) -> ApogeeResult<Vec<ManifestRecord>>;

    async fn get_period(
        &self,
        rover: Rover,
        period_key: PeriodKey,
    ) -> ApogeeResult<Option<ManifestRecord>>;

    async fn upsert_period(&self, rover: Rover, record: &ManifestRecord) -> ApogeeResult<()>;

    /// Returns whether a record was removed.
    async fn delete_period(&self, rover: Rover, period_key: PeriodKey) -> ApogeeResult<bool>;
}

/// APOD and NEO records, each stamped with its write time.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_apod(&self, date: NaiveDate) -> ApogeeResult<Option<Stamped<ApodRecord>>>;

    async fn upsert_apod(&self, record: &ApodRecord) -> ApogeeResult<()>;

    /// Stored entries dated within `[start, end]`, ascending.
    async fn apods_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApogeeResult<Vec<Stamped<ApodRecord>>>;

    async fn upsert_neo(&self, record: &NeoRecord) -> ApogeeResult<()>;

    /// Stored objects whose close approach falls within `[start, end]`,
    /// ascending by date then id.
    async fn neos_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApogeeResult<Vec<Stamped<NeoRecord>>>;
}

/// Everything the services need from durable storage.
#[async_trait]
pub trait Store: ManifestStore + RecordStore {
    /// Cheap round trip used by readiness probes.
    async fn ping(&self) -> ApogeeResult<()>;
}
