//! Persisted store for rover manifests, APOD and NEO records.

pub mod key;
pub mod lmdb;
pub mod memory;
pub mod traits;

pub use key::PeriodStoreKey;
pub use lmdb::LmdbStore;
pub use memory::InMemoryStore;
pub use traits::{ManifestStore, RecordStore, Store};
