//! Manifest reconciliation.
//!
//! Turns a freshly fetched rover manifest plus the currently stored records
//! into the minimal set of writes. Pure: no I/O, never fails.
//!
//! Rules, applied in order:
//! 1. Entries with a zero photo count are dropped.
//! 2. Entries sharing a sol are merged: counts summed, cameras unioned.
//! 3. Only sols strictly above the stored high-water mark are written.
//!    Older sols are never rewritten, even if their content changed.
//! 4. Stored sols missing from the merged manifest are deleted.

use std::collections::{BTreeMap, BTreeSet};

use crate::{ManifestRecord, PeriodKey, Rover};

/// Outcome of reconciling one rover's manifest. All lists ascend by sol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub rover: Rover,
    /// Deduplicated manifest, the authoritative view after this sync.
    pub merged: Vec<ManifestRecord>,
    pub to_insert_or_update: Vec<ManifestRecord>,
    pub to_delete: Vec<ManifestRecord>,
    /// Highest stored sol before reconciliation.
    pub high_water_mark: Option<PeriodKey>,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        self.to_insert_or_update.is_empty() && self.to_delete.is_empty()
    }

    /// Union of cameras across the merged manifest.
    pub fn categories(&self) -> BTreeSet<String> {
        self.merged
            .iter()
            .flat_map(|r| r.categories.iter().cloned())
            .collect()
    }

    pub fn period_keys(&self) -> Vec<PeriodKey> {
        self.merged.iter().map(|r| r.period_key).collect()
    }
}

/// Merge entries sharing a sol, dropping zero-count entries first.
pub fn dedupe(fresh: &[ManifestRecord]) -> Vec<ManifestRecord> {
    let mut by_period: BTreeMap<PeriodKey, ManifestRecord> = BTreeMap::new();
    for record in fresh.iter().filter(|r| r.has_items()) {
        by_period
            .entry(record.period_key)
            .and_modify(|merged| {
                merged.item_count = merged.item_count.saturating_add(record.item_count);
                merged
                    .categories
                    .extend(record.categories.iter().cloned());
                if record.last_updated > merged.last_updated {
                    merged.last_updated = record.last_updated;
                }
            })
            .or_insert_with(|| record.clone());
    }
    by_period.into_values().collect()
}

pub fn high_water_mark(stored: &[ManifestRecord]) -> Option<PeriodKey> {
    stored.iter().map(|r| r.period_key).max()
}

/// Compute the writes needed to bring `stored` in line with `fresh`.
pub fn reconcile(
    rover: Rover,
    fresh: &[ManifestRecord],
    stored: &[ManifestRecord],
) -> Reconciliation {
    let merged = dedupe(fresh);
    let high_water_mark = high_water_mark(stored);

    let to_insert_or_update = merged
        .iter()
        .filter(|r| high_water_mark.map_or(true, |h| r.period_key > h))
        .cloned()
        .collect();

    let merged_keys: BTreeSet<PeriodKey> = merged.iter().map(|r| r.period_key).collect();
    let mut to_delete: Vec<ManifestRecord> = stored
        .iter()
        .filter(|r| !merged_keys.contains(&r.period_key))
        .cloned()
        .collect();
    to_delete.sort_by_key(|r| r.period_key);
    to_delete.dedup_by_key(|r| r.period_key);

    Reconciliation {
        rover,
        merged,
        to_insert_or_update,
        to_delete,
        high_water_mark,
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn record_strategy() -> impl Strategy<Value = ManifestRecord> {
        (
            0u32..40,
            0u64..50,
            proptest::collection::btree_set("[A-E]", 0..3),
        )
            .prop_map(|(sol, count, cameras)| ManifestRecord::new(sol, count, cameras))
    }

    fn manifest_strategy() -> impl Strategy<Value = Vec<ManifestRecord>> {
        proptest::collection::vec(record_strategy(), 0..30)
    }

    /// Stored state after writing `plan` over `stored`, one row per sol.
    fn apply(stored: &[ManifestRecord], plan: &Reconciliation) -> Vec<ManifestRecord> {
        let mut rows: BTreeMap<PeriodKey, ManifestRecord> =
            stored.iter().map(|r| (r.period_key, r.clone())).collect();
        for record in &plan.to_delete {
            rows.remove(&record.period_key);
        }
        for record in &plan.to_insert_or_update {
            rows.insert(record.period_key, record.clone());
        }
        rows.into_values().collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Merged records sum counts and union cameras of their contributing entries.
        #[test]
        fn prop_merge_sums_and_unions(fresh in manifest_strategy()) {
            let merged = dedupe(&fresh);
            for record in &merged {
                let contributing: Vec<&ManifestRecord> = fresh
                    .iter()
                    .filter(|r| r.period_key == record.period_key && r.item_count > 0)
                    .collect();
                let count: u64 = contributing.iter().map(|r| r.item_count).sum();
                let cameras: BTreeSet<String> = contributing
                    .iter()
                    .flat_map(|r| r.categories.iter().cloned())
                    .collect();
                prop_assert_eq!(record.item_count, count);
                prop_assert_eq!(&record.categories, &cameras);
            }
            let mut keys: Vec<PeriodKey> = merged.iter().map(|r| r.period_key).collect();
            let before = keys.len();
            keys.dedup();
            prop_assert_eq!(keys.len(), before);
        }

        /// Nothing at or below the stored high-water mark is ever re-inserted.
        #[test]
        fn prop_monotonic_inserts(fresh in manifest_strategy(), stored in manifest_strategy()) {
            let result = reconcile(Rover::Curiosity, &fresh, &stored);
            if let Some(h) = high_water_mark(&stored) {
                prop_assert!(result.to_insert_or_update.iter().all(|r| r.period_key > h));
            } else {
                prop_assert_eq!(result.to_insert_or_update.len(), result.merged.len());
            }
        }

        /// A stored sol absent from the fresh manifest is deleted and never inserted.
        #[test]
        fn prop_deletion_correctness(fresh in manifest_strategy(), stored in manifest_strategy()) {
            let result = reconcile(Rover::Spirit, &fresh, &stored);
            let merged_keys: BTreeSet<PeriodKey> = result.merged.iter().map(|r| r.period_key).collect();
            for record in &stored {
                if !merged_keys.contains(&record.period_key) {
                    prop_assert!(result.to_delete.iter().any(|d| d.period_key == record.period_key));
                    prop_assert!(!result.to_insert_or_update.iter().any(|i| i.period_key == record.period_key));
                }
            }
            for record in &result.to_delete {
                prop_assert!(!merged_keys.contains(&record.period_key));
            }
        }

        /// Re-running against the already-reconciled manifest changes nothing.
        #[test]
        fn prop_idempotent(fresh in manifest_strategy()) {
            let first = reconcile(Rover::Opportunity, &fresh, &[]);
            let second = reconcile(Rover::Opportunity, &fresh, &first.merged);
            prop_assert!(second.is_noop());
        }

        /// From any stored state, a second pass deletes nothing and a third
        /// pass writes nothing. The second pass may still insert: deleting
        /// the old maximum lowers the high-water mark.
        #[test]
        fn prop_converges_from_stored(fresh in manifest_strategy(), stored in manifest_strategy()) {
            let first = reconcile(Rover::Perseverance, &fresh, &stored);
            let after_first = apply(&stored, &first);

            let second = reconcile(Rover::Perseverance, &fresh, &after_first);
            prop_assert!(second.to_delete.is_empty());
            let after_second = apply(&after_first, &second);

            let third = reconcile(Rover::Perseverance, &fresh, &after_second);
            prop_assert!(third.is_noop());
            prop_assert_eq!(apply(&after_second, &third), after_second);
        }
    }
}
