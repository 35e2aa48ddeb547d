//! Sync and query against the LMDB store and cache.

use std::sync::Arc;
use std::time::Duration;

use apogee_api::services::{ManifestSynchronizer, RoverQueryService, SyncMode};
use apogee_api::MockUpstream;
use apogee_core::{ManifestRecord, Rover};
use apogee_storage::{FreshnessPolicy, LmdbCache, LmdbStore, ManifestStore, ReadThroughCache};
use tempfile::TempDir;

#[tokio::test]
async fn synced_manifest_is_served_from_lmdb() {
    let dir = TempDir::new().expect("TempDir creation should succeed");
    let store = Arc::new(LmdbStore::new(dir.path().join("store"), 10).expect("open store"));
    let cache = ReadThroughCache::new(
        Arc::new(LmdbCache::new(dir.path().join("cache"), 10).expect("open cache")),
        FreshnessPolicy::default(),
    );

    store
        .upsert_period(Rover::Opportunity, &ManifestRecord::new(1, 7, ["PANCAM"]))
        .await
        .expect("seed write");
    store
        .upsert_period(Rover::Opportunity, &ManifestRecord::new(2, 3, ["PANCAM"]))
        .await
        .expect("seed write");

    let upstream = Arc::new(MockUpstream::new().with_manifest(
        Rover::Opportunity,
        vec![
            ManifestRecord::new(1, 7, ["PANCAM"]),
            ManifestRecord::new(4, 2, ["NAVCAM"]),
            ManifestRecord::new(4, 1, ["PANCAM"]),
        ],
    ));
    let sync = ManifestSynchronizer::new(store.clone(), upstream.clone(), cache);
    let report = sync
        .sync_rover(Rover::Opportunity, SyncMode::IfStale)
        .await
        .expect("sync");
    assert_eq!(report.inserted, 1);
    assert_eq!(report.deleted, 1);
    assert!(sync
        .cached_manifest(Rover::Opportunity)
        .await
        .expect("cache read")
        .is_some());

    let rovers = RoverQueryService::new(store, upstream.clone(), Duration::ZERO);
    assert_eq!(
        rovers.get_periods_with_items("opportunity").await.expect("sols"),
        vec![1, 4]
    );
    assert_eq!(
        rovers.get_categories_for("opportunity").await.expect("cameras"),
        vec!["NAVCAM".to_string(), "PANCAM".to_string()]
    );

    let summaries = rovers
        .get_items_for_periods("opportunity", Some(&[4][..]), None, true)
        .await
        .expect("summaries");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].item_count, 3);
    assert_eq!(upstream.calls().items, 0);
}
