//! In-memory store for development and tests.

use std::collections::{BTreeMap, HashMap};

use apogee_core::{
    ApodRecord, ApogeeResult, ManifestRecord, NeoRecord, PeriodKey, Rover, RoverProfile, Stamped,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use super::traits::{ManifestStore, RecordStore, Store};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    profiles: RwLock<HashMap<Rover, RoverProfile>>,
    periods: RwLock<HashMap<Rover, BTreeMap<PeriodKey, ManifestRecord>>>,
    apods: RwLock<BTreeMap<NaiveDate, Stamped<ApodRecord>>>,
    neos: RwLock<HashMap<String, Stamped<NeoRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ManifestStore for InMemoryStore {
    async fn get_profile(&self, rover: Rover) -> ApogeeResult<Option<RoverProfile>> {
        Ok(self.profiles.read().await.get(&rover).cloned())
    }

    async fn put_profile(&self, profile: &RoverProfile) -> ApogeeResult<()> {
        self.profiles
            .write()
            .await
            .insert(profile.rover, profile.clone());
        Ok(())
    }

    async fn list_periods(&self, rover: Rover) -> ApogeeResult<Vec<ManifestRecord>> {
        Ok(self
            .periods
            .read()
            .await
            .get(&rover)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_period(
        &self,
        rover: Rover,
        period_key: PeriodKey,
    ) -> ApogeeResult<Option<ManifestRecord>> {
        Ok(self
            .periods
            .read()
            .await
            .get(&rover)
            .and_then(|records| records.get(&period_key))
            .cloned())
    }

    async fn upsert_period(&self, rover: Rover, record: &ManifestRecord) -> ApogeeResult<()> {
        self.periods
            .write()
            .await
            .entry(rover)
            .or_default()
            .insert(record.period_key, record.clone());
        Ok(())
    }

    async fn delete_period(&self, rover: Rover, period_key: PeriodKey) -> ApogeeResult<bool> {
        Ok(self
            .periods
            .write()
            .await
            .get_mut(&rover)
            .map(|records| records.remove(&period_key).is_some())
            .unwrap_or(false))
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn get_apod(&self, date: NaiveDate) -> ApogeeResult<Option<Stamped<ApodRecord>>> {
        Ok(self.apods.read().await.get(&date).cloned())
    }

    async fn upsert_apod(&self, record: &ApodRecord) -> ApogeeResult<()> {
        self.apods
            .write()
            .await
            .insert(record.date, Stamped::now(record.clone()));
        Ok(())
    }

    async fn apods_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApogeeResult<Vec<Stamped<ApodRecord>>> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self
            .apods
            .read()
            .await
            .range(start..=end)
            .map(|(_, stamped)| stamped.clone())
            .collect())
    }

    async fn upsert_neo(&self, record: &NeoRecord) -> ApogeeResult<()> {
        self.neos
            .write()
            .await
            .insert(record.id.clone(), Stamped::now(record.clone()));
        Ok(())
    }

    async fn neos_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApogeeResult<Vec<Stamped<NeoRecord>>> {
        let mut found: Vec<Stamped<NeoRecord>> = self
            .neos
            .read()
            .await
            .values()
            .filter(|s| s.value.close_approach_date >= start && s.value.close_approach_date <= end)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.value
                .close_approach_date
                .cmp(&b.value.close_approach_date)
                .then_with(|| a.value.id.cmp(&b.value.id))
        });
        Ok(found)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ping(&self) -> ApogeeResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apogee_core::EstimatedDiameter;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    fn neo(id: &str, day: NaiveDate) -> NeoRecord {
        NeoRecord {
            id: id.to_string(),
            name: format!("({})", id),
            absolute_magnitude: Some(22.1),
            estimated_diameter: EstimatedDiameter { min: 0.1, max: 0.3 },
            is_potentially_hazardous: false,
            close_approach_date: day,
            miss_distance_km: 4_500_000.0,
            relative_velocity_kmh: 54_000.0,
            relative_velocity_kps: 15.0,
        }
    }

    #[tokio::test]
    async fn test_periods_are_listed_ascending() -> ApogeeResult<()> {
        let store = InMemoryStore::new();
        for sol in [9, 2, 5] {
            store
                .upsert_period(Rover::Curiosity, &ManifestRecord::new(sol, 1, ["FHAZ"]))
                .await?;
        }
        let sols: Vec<PeriodKey> = store
            .list_periods(Rover::Curiosity)
            .await?
            .iter()
            .map(|r| r.period_key)
            .collect();
        assert_eq!(sols, vec![2, 5, 9]);
        assert!(store.list_periods(Rover::Spirit).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_delete_removes() -> ApogeeResult<()> {
        let store = InMemoryStore::new();
        store
            .upsert_period(Rover::Spirit, &ManifestRecord::new(3, 1, ["PANCAM"]))
            .await?;
        store
            .upsert_period(Rover::Spirit, &ManifestRecord::new(3, 8, ["NAVCAM"]))
            .await?;
        let record = store.get_period(Rover::Spirit, 3).await?;
        assert_eq!(record.map(|r| r.item_count), Some(8));

        assert!(store.delete_period(Rover::Spirit, 3).await?);
        assert!(!store.delete_period(Rover::Spirit, 3).await?);
        assert!(store.get_period(Rover::Spirit, 3).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_neos_filtered_by_approach_date() -> ApogeeResult<()> {
        let store = InMemoryStore::new();
        store.upsert_neo(&neo("b", date(2024, 1, 3))).await?;
        store.upsert_neo(&neo("a", date(2024, 1, 3))).await?;
        store.upsert_neo(&neo("c", date(2024, 1, 10))).await?;

        let ids: Vec<String> = store
            .neos_between(date(2024, 1, 1), date(2024, 1, 7))
            .await?
            .into_iter()
            .map(|s| s.value.id)
            .collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
        Ok(())
    }
}
