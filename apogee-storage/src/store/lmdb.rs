//! LMDB-backed persisted store.
//!
//! One environment with five named databases:
//!
//! | database      | key                          | value                      |
//! |---------------|------------------------------|----------------------------|
//! | `rovers`      | rover name                   | `RoverProfile` JSON        |
//! | `sols`        | [`PeriodStoreKey`]           | `ManifestRecord` JSON      |
//! | `apod`        | `YYYY-MM-DD`                 | `Stamped<ApodRecord>` JSON |
//! | `neo`         | NEO id                       | `Stamped<NeoRecord>` JSON  |
//! | `neo_by_date` | `YYYY-MM-DD 0xFF id`         | empty                      |
//!
//! Range reads walk only the matching keys: a rover prefix for sols, a date
//! range for APOD entries and the date index for NEOs.

use std::ops::Bound;
use std::path::Path;

use apogee_core::{
    ApodRecord, ApogeeResult, ManifestRecord, NeoRecord, PeriodKey, Rover, RoverProfile, Stamped,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use heed::types::Bytes;
use heed::{Database, Env};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::key::{date_key, neo_date_key, neo_id_from_date_key, rover_prefix, PeriodStoreKey};
use super::traits::{ManifestStore, RecordStore, Store};
use crate::cache::lmdb_backend::{create_db, open_env, LmdbError};

pub struct LmdbStore {
    env: Env,
    rovers: Database<Bytes, Bytes>,
    sols: Database<Bytes, Bytes>,
    apods: Database<Bytes, Bytes>,
    neos: Database<Bytes, Bytes>,
    neos_by_date: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open or create the store under `path`, sized at `max_size_mb`.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbError> {
        let env = open_env(path, max_size_mb, 5)?;
        Ok(Self {
            rovers: create_db(&env, "rovers")?,
            sols: create_db(&env, "sols")?,
            apods: create_db(&env, "apod")?,
            neos: create_db(&env, "neo")?,
            neos_by_date: create_db(&env, "neo_by_date")?,
            env,
        })
    }

    fn read<T: DeserializeOwned>(
        &self,
        db: &Database<Bytes, Bytes>,
        key: &[u8],
    ) -> Result<Option<T>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        match db.get(&rtxn, key)? {
            Some(bytes) => decode(key, bytes).map(Some),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(
        &self,
        db: &Database<Bytes, Bytes>,
        key: &[u8],
        value: &T,
    ) -> Result<(), LmdbError> {
        let bytes = serde_json::to_vec(value).map_err(|e| LmdbError::Serialization(e.to_string()))?;
        let mut wtxn = self.env.write_txn()?;
        db.put(&mut wtxn, key, bytes.as_slice())?;
        wtxn.commit()?;
        Ok(())
    }

    fn write_neo(&self, record: &NeoRecord) -> Result<(), LmdbError> {
        let stamped = Stamped::now(record.clone());
        let bytes =
            serde_json::to_vec(&stamped).map_err(|e| LmdbError::Serialization(e.to_string()))?;
        let id = record.id.as_bytes();

        let mut wtxn = self.env.write_txn()?;
        let previous = match self.neos.get(&wtxn, id)? {
            Some(old) => Some(decode::<Stamped<NeoRecord>>(id, old)?.value.close_approach_date),
            None => None,
        };
        if let Some(old_date) = previous.filter(|d| *d != record.close_approach_date) {
            let stale = neo_date_key(old_date, &record.id);
            self.neos_by_date.delete(&mut wtxn, stale.as_slice())?;
        }
        let index_key = neo_date_key(record.close_approach_date, &record.id);
        let empty: &[u8] = &[];
        self.neos.put(&mut wtxn, id, bytes.as_slice())?;
        self.neos_by_date.put(&mut wtxn, index_key.as_slice(), empty)?;
        wtxn.commit()?;
        Ok(())
    }

    fn read_neos_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Stamped<NeoRecord>>, LmdbError> {
        let low = date_key(start);
        let high = end.succ_opt().map(date_key);
        let upper = match &high {
            Some(next) => Bound::Excluded(next.as_bytes()),
            None => Bound::Unbounded,
        };

        let range = (Bound::Included(low.as_bytes()), upper);

        let rtxn = self.env.read_txn()?;
        let mut found = Vec::new();
        for result in self.neos_by_date.range(&rtxn, &range)? {
            let (index_key, _) = result?;
            let id = neo_id_from_date_key(index_key).ok_or_else(|| LmdbError::Deserialization {
                key: String::from_utf8_lossy(index_key).into_owned(),
                reason: "malformed NEO date index key".to_string(),
            })?;
            match self.neos.get(&rtxn, id)? {
                Some(bytes) => found.push(decode(id, bytes)?),
                None => tracing::warn!(
                    id = %String::from_utf8_lossy(id),
                    "NEO date index points at a missing record"
                ),
            }
        }
        Ok(found)
    }

    fn read_periods(&self, rover: Rover) -> Result<Vec<ManifestRecord>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        let mut records = Vec::new();
        let prefix = rover_prefix(rover);
        for result in self.sols.prefix_iter(&rtxn, prefix.as_slice())? {
            let (key, bytes) = result?;
            let record: ManifestRecord = decode(key, bytes)?;
            match PeriodStoreKey::decode(key) {
                Some(k) if k.rover() == rover && k.period_key() == record.period_key => {
                    records.push(record)
                }
                _ => tracing::warn!(
                    rover = %rover,
                    sol = record.period_key,
                    "Skipping sol record stored under a mismatched key"
                ),
            }
        }
        Ok(records)
    }

    fn read_apods_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Stamped<ApodRecord>>, LmdbError> {
        let (low, high) = (date_key(start), date_key(end));
        let rtxn = self.env.read_txn()?;
        let mut records = Vec::new();
        let range = (Bound::Included(low.as_bytes()), Bound::Included(high.as_bytes()));
        for result in self.apods.range(&rtxn, &range)? {
            let (key, bytes) = result?;
            records.push(decode(key, bytes)?);
        }
        Ok(records)
    }
}

fn decode<T: DeserializeOwned>(key: &[u8], bytes: &[u8]) -> Result<T, LmdbError> {
    serde_json::from_slice(bytes).map_err(|e| LmdbError::Deserialization {
        key: String::from_utf8_lossy(key).into_owned(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl ManifestStore for LmdbStore {
    async fn get_profile(&self, rover: Rover) -> ApogeeResult<Option<RoverProfile>> {
        Ok(self.read(&self.rovers, rover.as_str().as_bytes())?)
    }

    async fn put_profile(&self, profile: &RoverProfile) -> ApogeeResult<()> {
        Ok(self.write(&self.rovers, profile.rover.as_str().as_bytes(), profile)?)
    }

    async fn list_periods(&self, rover: Rover) -> ApogeeResult<Vec<ManifestRecord>> {
        Ok(self.read_periods(rover)?)
    }

    async fn get_period(
        &self,
        rover: Rover,
        period_key: PeriodKey,
    ) -> ApogeeResult<Option<ManifestRecord>> {
        let key = PeriodStoreKey::new(rover, period_key).encode();
        Ok(self.read(&self.sols, &key)?)
    }

    async fn upsert_period(&self, rover: Rover, record: &ManifestRecord) -> ApogeeResult<()> {
        let key = PeriodStoreKey::new(rover, record.period_key).encode();
        Ok(self.write(&self.sols, &key, record)?)
    }

    async fn delete_period(&self, rover: Rover, period_key: PeriodKey) -> ApogeeResult<bool> {
        let key = PeriodStoreKey::new(rover, period_key).encode();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let removed = self
            .sols
            .delete(&mut wtxn, key.as_slice())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(removed)
    }
}

#[async_trait]
impl RecordStore for LmdbStore {
    async fn get_apod(&self, date: NaiveDate) -> ApogeeResult<Option<Stamped<ApodRecord>>> {
        Ok(self.read(&self.apods, date_key(date).as_bytes())?)
    }

    async fn upsert_apod(&self, record: &ApodRecord) -> ApogeeResult<()> {
        let stamped = Stamped::now(record.clone());
        Ok(self.write(&self.apods, date_key(record.date).as_bytes(), &stamped)?)
    }

    async fn apods_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApogeeResult<Vec<Stamped<ApodRecord>>> {
        Ok(self.read_apods_between(start, end)?)
    }

    async fn upsert_neo(&self, record: &NeoRecord) -> ApogeeResult<()> {
        Ok(self.write_neo(record)?)
    }

    async fn neos_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApogeeResult<Vec<Stamped<NeoRecord>>> {
        Ok(self.read_neos_between(start, end)?)
    }
}

#[async_trait]
impl Store for LmdbStore {
    async fn ping(&self) -> ApogeeResult<()> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        self.rovers.len(&rtxn).map_err(LmdbError::from)?;
        Ok(())
    }
}
