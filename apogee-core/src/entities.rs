//! Core entity structures

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{PeriodKey, Timestamp, ValidationError};

// ============================================================================
// ROVERS
// ============================================================================

/// A Mars rover with a photo manifest. The parent entity of every
/// [`ManifestRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Rover {
    Curiosity,
    Perseverance,
    Opportunity,
    Spirit,
}

impl Rover {
    /// Every rover, in background sync order.
    pub const ALL: [Rover; 4] = [
        Rover::Curiosity,
        Rover::Perseverance,
        Rover::Opportunity,
        Rover::Spirit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rover::Curiosity => "curiosity",
            Rover::Perseverance => "perseverance",
            Rover::Opportunity => "opportunity",
            Rover::Spirit => "spirit",
        }
    }
}

impl fmt::Display for Rover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rover {
    type Err = ValidationError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "curiosity" => Ok(Rover::Curiosity),
            "perseverance" => Ok(Rover::Perseverance),
            "opportunity" => Ok(Rover::Opportunity),
            "spirit" => Ok(Rover::Spirit),
            _ => Err(ValidationError::UnknownParent {
                identity: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// MANIFEST
// ============================================================================

/// Per-sol summary of a rover's photo manifest.
///
/// `period_key` is unique per rover. Cameras are kept ordered so that merged
/// records serialize deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ManifestRecord {
    #[serde(rename = "sol")]
    pub period_key: PeriodKey,
    #[serde(rename = "photoCount")]
    pub item_count: u64,
    #[serde(rename = "cameras")]
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub categories: BTreeSet<String>,
    #[serde(rename = "lastUpdated")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub last_updated: Timestamp,
}

impl ManifestRecord {
    pub fn new<I, S>(period_key: PeriodKey, item_count: u64, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            period_key,
            item_count,
            categories: categories.into_iter().map(Into::into).collect(),
            last_updated: Utc::now(),
        }
    }

    pub fn has_items(&self) -> bool {
        self.item_count > 0
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains(category)
    }
}

/// Rover-level metadata persisted alongside the per-sol records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RoverProfile {
    pub rover: Rover,
    /// Every sol present in the last reconciled manifest, ascending.
    #[serde(rename = "availableSols")]
    pub known_periods: Vec<PeriodKey>,
    #[serde(rename = "availableCameras")]
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub known_categories: BTreeSet<String>,
    /// UTC calendar day of the last successful sync.
    #[serde(rename = "lastChecked")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub last_checked: Option<NaiveDate>,
    #[serde(rename = "lastUpdated")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub last_updated: Timestamp,
}

impl RoverProfile {
    pub fn empty(rover: Rover) -> Self {
        Self {
            rover,
            known_periods: Vec::new(),
            known_categories: BTreeSet::new(),
            last_checked: None,
            last_updated: Utc::now(),
        }
    }

    /// Compared as `YYYY-MM-DD` strings, so any sync earlier the same UTC day counts.
    pub fn checked_on(&self, day: NaiveDate) -> bool {
        self.last_checked
            .map(|checked| checked.format("%Y-%m-%d").to_string() == day.format("%Y-%m-%d").to_string())
            .unwrap_or(false)
    }
}

// ============================================================================
// PHOTOS
// ============================================================================

/// One rover photo. Fetched on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RoverPhoto {
    pub id: u64,
    #[serde(rename = "img_src")]
    pub media_url: String,
    #[serde(rename = "earth_date")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date"))]
    pub captured_at: NaiveDate,
    #[serde(rename = "camera")]
    pub category_tag: String,
    #[serde(rename = "rover")]
    pub parent: Rover,
    #[serde(rename = "sol")]
    pub period_key: PeriodKey,
}

/// Photos (or only their count) for one requested sol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PeriodResult {
    #[serde(rename = "sol")]
    pub period_key: PeriodKey,
    #[serde(rename = "photoCount")]
    pub item_count: u64,
    #[serde(rename = "camera")]
    pub category: Option<String>,
    #[serde(rename = "photos")]
    pub items: Vec<RoverPhoto>,
}

impl PeriodResult {
    /// Summary built from a stored record, without photos.
    pub fn summary(record: &ManifestRecord, category: Option<&str>) -> Self {
        Self {
            period_key: record.period_key,
            item_count: record.item_count,
            category: category
                .map(str::to_string)
                .or_else(|| record.categories.iter().next().cloned()),
            items: Vec::new(),
        }
    }
}

// ============================================================================
// APOD
// ============================================================================

/// Astronomy Picture of the Day entry, keyed by date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApodRecord {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date"))]
    pub date: NaiveDate,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdurl: Option<String>,
    pub explanation: String,
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
}

impl ApodRecord {
    pub fn is_image(&self) -> bool {
        self.media_type == "image"
    }
}

// ============================================================================
// NEAR-EARTH OBJECTS
// ============================================================================

/// Estimated diameter range in kilometers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EstimatedDiameter {
    pub min: f64,
    pub max: f64,
}

/// A near-earth object with its first close approach in the requested window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct NeoRecord {
    pub id: String,
    pub name: String,
    pub absolute_magnitude: Option<f64>,
    pub estimated_diameter: EstimatedDiameter,
    pub is_potentially_hazardous: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date"))]
    pub close_approach_date: NaiveDate,
    pub miss_distance_km: f64,
    pub relative_velocity_kmh: f64,
    pub relative_velocity_kps: f64,
}

// ============================================================================
// PERSISTED ROW WRAPPER
// ============================================================================

/// A persisted value with the time it was last written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamped<T> {
    pub value: T,
    pub cached_at: Timestamp,
}

impl<T> Stamped<T> {
    pub fn now(value: T) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rover_parse_is_case_insensitive() {
        assert_eq!("Curiosity".parse::<Rover>(), Ok(Rover::Curiosity));
        assert_eq!(" SPIRIT ".parse::<Rover>(), Ok(Rover::Spirit));
        assert!(matches!(
            "sojourner".parse::<Rover>(),
            Err(ValidationError::UnknownParent { .. })
        ));
    }

    #[test]
    fn test_rover_serializes_lowercase() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&Rover::Perseverance)?;
        assert_eq!(json, "\"perseverance\"");
        Ok(())
    }

    #[test]
    fn test_photo_uses_upstream_field_names() -> Result<(), serde_json::Error> {
        let photo = RoverPhoto {
            id: 102693,
            media_url: "https://mars.nasa.gov/img.jpg".to_string(),
            captured_at: NaiveDate::from_ymd_opt(2012, 8, 6).unwrap_or_default(),
            category_tag: "FHAZ".to_string(),
            parent: Rover::Curiosity,
            period_key: 0,
        };
        let value = serde_json::to_value(&photo)?;
        assert_eq!(value["img_src"], "https://mars.nasa.gov/img.jpg");
        assert_eq!(value["earth_date"], "2012-08-06");
        assert_eq!(value["camera"], "FHAZ");
        assert_eq!(value["rover"], "curiosity");
        assert_eq!(value["sol"], 0);
        Ok(())
    }

    #[test]
    fn test_summary_defaults_to_first_camera() {
        let record = ManifestRecord::new(12, 40, ["NAVCAM", "FHAZ"]);
        let summary = PeriodResult::summary(&record, None);
        assert_eq!(summary.category.as_deref(), Some("FHAZ"));
        assert_eq!(summary.item_count, 40);
        assert!(summary.items.is_empty());

        let filtered = PeriodResult::summary(&record, Some("NAVCAM"));
        assert_eq!(filtered.category.as_deref(), Some("NAVCAM"));
    }

    #[test]
    fn test_profile_checked_on_same_day() {
        let mut profile = RoverProfile::empty(Rover::Opportunity);
        let today = Utc::now().date_naive();
        assert!(!profile.checked_on(today));

        profile.last_checked = Some(today);
        assert!(profile.checked_on(today));
        assert!(!profile.checked_on(today.succ_opt().unwrap_or(today)));
    }
}
