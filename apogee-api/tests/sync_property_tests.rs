//! Property-Based Tests for Manifest Sync
//!
//! **Property: Stored manifest converges on the reconciled view**
//!
//! For any stored manifest and any fresh upstream manifest, one forced sync
//! SHALL leave the store holding:
//! - every previously stored sol that is still in the fresh manifest
//! - every fresh sol above the old high-water mark
//! - nothing else
//!
//! Re-syncing the same manifest SHALL delete nothing on the second run and
//! write nothing from the third run on. The second run may still insert:
//! when the first run deleted the stored maximum, the high-water mark drops.

use std::collections::BTreeSet;
use std::sync::Arc;

use apogee_api::services::{ManifestSynchronizer, PeriodAction, SyncMode};
use apogee_api::MockUpstream;
use apogee_core::{dedupe, high_water_mark, ManifestRecord, PeriodKey, Rover};
use apogee_storage::{FreshnessPolicy, InMemoryCache, ManifestStore, ReadThroughCache};
use apogee_test_utils::generators::{arb_manifest, arb_rover, arb_stored_manifest};
use apogee_test_utils::{FlakyStore, InMemoryStore};
use proptest::prelude::*;
use tokio::runtime::Runtime;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn fail<E: std::fmt::Display>(e: E) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

fn cache() -> ReadThroughCache {
    ReadThroughCache::new(Arc::new(InMemoryCache::new()), FreshnessPolicy::default())
}

/// Sols the store should hold after reconciling `fresh` against `stored`.
fn expected_sols(fresh: &[ManifestRecord], stored: &[ManifestRecord]) -> BTreeSet<PeriodKey> {
    let merged: BTreeSet<PeriodKey> = dedupe(fresh).iter().map(|r| r.period_key).collect();
    let mark = high_water_mark(stored);
    let kept = stored
        .iter()
        .map(|r| r.period_key)
        .filter(|sol| merged.contains(sol));
    let added = merged
        .iter()
        .copied()
        .filter(|sol| mark.map_or(true, |m| *sol > m));
    kept.chain(added).collect()
}

async fn stored_sols<S: ManifestStore>(store: &S, rover: Rover) -> Result<BTreeSet<PeriodKey>, TestCaseError> {
    Ok(store
        .list_periods(rover)
        .await
        .map_err(fail)?
        .iter()
        .map(|r| r.period_key)
        .collect())
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// **Property: Sync converges and is idempotent**
    #[test]
    fn prop_sync_converges(
        rover in arb_rover(),
        stored in arb_stored_manifest(12),
        fresh in arb_manifest(24),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let store = Arc::new(InMemoryStore::new());
            for record in &stored {
                store.upsert_period(rover, record).await.map_err(fail)?;
            }
            let upstream = Arc::new(MockUpstream::new().with_manifest(rover, fresh.clone()));
            let sync = ManifestSynchronizer::new(store.clone(), upstream, cache());

            // ================================================================
            // FIRST SYNC - store matches the reconciled view
            // ================================================================
            let report = sync.sync_rover(rover, SyncMode::Force).await.map_err(fail)?;
            prop_assert!(report.is_clean());
            prop_assert_eq!(stored_sols(store.as_ref(), rover).await?, expected_sols(&fresh, &stored));

            let profile = store
                .get_profile(rover)
                .await
                .map_err(fail)?
                .ok_or_else(|| TestCaseError::fail("profile missing after sync"))?;
            let merged: Vec<PeriodKey> = dedupe(&fresh).iter().map(|r| r.period_key).collect();
            prop_assert_eq!(profile.known_periods, merged);

            // ================================================================
            // SECOND SYNC - nothing left to delete
            // ================================================================
            let after_first = stored_sols(store.as_ref(), rover).await?;
            let second = sync.sync_rover(rover, SyncMode::Force).await.map_err(fail)?;
            prop_assert_eq!(second.deleted, 0);
            let after_second = stored_sols(store.as_ref(), rover).await?;
            prop_assert!(after_second.is_superset(&after_first));
            prop_assert_eq!(after_second.len(), after_first.len() + second.inserted as usize);

            // ================================================================
            // THIRD SYNC - nothing left to write
            // ================================================================
            let third = sync.sync_rover(rover, SyncMode::Force).await.map_err(fail)?;
            prop_assert_eq!(third.inserted, 0);
            prop_assert_eq!(third.deleted, 0);
            prop_assert_eq!(stored_sols(store.as_ref(), rover).await?, after_second);

            Ok(())
        })?;
    }

    /// **Property: One failing write never blocks the others**
    #[test]
    fn prop_failed_sol_is_isolated(
        fresh in arb_manifest(24),
        pick in any::<prop::sample::Index>(),
    ) {
        let merged = dedupe(&fresh);
        prop_assume!(!merged.is_empty());
        let bad = merged[pick.index(merged.len())].period_key;

        let rt = test_runtime()?;
        rt.block_on(async {
            let store = Arc::new(FlakyStore::new().fail_upsert_for(bad));
            let upstream = Arc::new(MockUpstream::new().with_manifest(Rover::Curiosity, fresh.clone()));
            let sync = ManifestSynchronizer::new(store.clone(), upstream, cache());

            let report = sync
                .sync_rover(Rover::Curiosity, SyncMode::Force)
                .await
                .map_err(fail)?;

            prop_assert_eq!(report.failures.len(), 1);
            prop_assert_eq!(report.failures[0].sol, bad);
            prop_assert_eq!(report.failures[0].action, PeriodAction::Insert);
            prop_assert_eq!(report.inserted as usize, merged.len() - 1);

            let mut expected: BTreeSet<PeriodKey> = merged.iter().map(|r| r.period_key).collect();
            expected.remove(&bad);
            prop_assert_eq!(stored_sols(store.as_ref(), Rover::Curiosity).await?, expected);
            Ok(())
        })?;
    }
}
