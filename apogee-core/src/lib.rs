//! APOGEE Core - Entity Types and Reconciliation
//!
//! Data structures shared by every other crate, the error taxonomy, input
//! validation, and the pure manifest reconciler. No I/O lives here.

use chrono::{DateTime, Utc};

pub mod entities;
pub mod error;
pub mod reconcile;
pub mod validation;

pub use entities::{
    ApodRecord, EstimatedDiameter, ManifestRecord, NeoRecord, PeriodResult, Rover, RoverPhoto,
    RoverProfile, Stamped,
};
pub use error::{
    ApogeeError, ApogeeResult, ConfigError, StorageError, UpstreamError, ValidationError,
};
pub use reconcile::{dedupe, high_water_mark, reconcile, Reconciliation};
pub use validation::{dates_between, parse_date, validate_range};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Martian solar day number, the grouping key of a rover manifest.
pub type PeriodKey = u32;
