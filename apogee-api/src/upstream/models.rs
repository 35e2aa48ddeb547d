//! NASA wire formats and their conversion into domain records.
//!
//! Only the fields the proxy uses are decoded; everything else is ignored.

use std::collections::BTreeMap;

use apogee_core::{
    ApodRecord, EstimatedDiameter, ManifestRecord, NeoRecord, PeriodKey, Rover, RoverPhoto,
};
use chrono::NaiveDate;
use serde::Deserialize;

// ============================================================================
// MARS ROVER PHOTOS
// ============================================================================

/// `GET /mars-photos/api/v1/manifests/{rover}`
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestResponse {
    pub photo_manifest: PhotoManifest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoManifest {
    pub name: String,
    #[serde(default)]
    pub max_sol: Option<PeriodKey>,
    #[serde(default)]
    pub total_photos: Option<u64>,
    #[serde(default)]
    pub photos: Vec<ManifestSol>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestSol {
    pub sol: PeriodKey,
    #[serde(default)]
    pub total_photos: u64,
    #[serde(default)]
    pub cameras: Vec<String>,
}

impl From<&ManifestSol> for ManifestRecord {
    fn from(entry: &ManifestSol) -> Self {
        ManifestRecord::new(entry.sol, entry.total_photos, entry.cameras.iter().cloned())
    }
}

/// A decoded manifest plus the raw body, which is what the freshness cache keeps.
#[derive(Debug, Clone)]
pub struct ManifestPayload {
    /// One record per manifest line, in upstream order, duplicates included.
    pub records: Vec<ManifestRecord>,
    pub raw: serde_json::Value,
}

impl ManifestPayload {
    pub fn from_response(response: &ManifestResponse, raw: serde_json::Value) -> Self {
        Self {
            records: response
                .photo_manifest
                .photos
                .iter()
                .map(ManifestRecord::from)
                .collect(),
            raw,
        }
    }
}

/// `GET /mars-photos/api/v1/rovers/{rover}/photos`
#[derive(Debug, Clone, Deserialize)]
pub struct PhotosResponse {
    #[serde(default)]
    pub photos: Vec<WirePhoto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WirePhoto {
    pub id: u64,
    pub sol: PeriodKey,
    pub img_src: String,
    pub earth_date: NaiveDate,
    pub camera: WireCamera,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireCamera {
    pub name: String,
}

impl WirePhoto {
    /// The rover is taken from the request; the embedded rover object is
    /// capitalised differently across missions.
    pub fn into_photo(self, rover: Rover) -> RoverPhoto {
        RoverPhoto {
            id: self.id,
            media_url: self.img_src,
            captured_at: self.earth_date,
            category_tag: self.camera.name,
            parent: rover,
            period_key: self.sol,
        }
    }
}

// ============================================================================
// APOD
// ============================================================================

/// `GET /planetary/apod` answers with a single object for a date query and
/// an array for range and count queries.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApodResponse {
    Many(Vec<WireApod>),
    One(Box<WireApod>),
}

impl ApodResponse {
    pub fn into_vec(self) -> Vec<WireApod> {
        match self {
            ApodResponse::Many(entries) => entries,
            ApodResponse::One(entry) => vec![*entry],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireApod {
    pub date: NaiveDate,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub hdurl: Option<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub service_version: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
}

impl From<WireApod> for ApodRecord {
    fn from(wire: WireApod) -> Self {
        ApodRecord {
            date: wire.date,
            title: wire.title,
            url: wire.url.unwrap_or_default(),
            hdurl: wire.hdurl,
            explanation: wire.explanation,
            media_type: wire.media_type,
            service_version: wire.service_version,
            copyright: wire.copyright.map(|c| c.trim().to_string()),
        }
    }
}

// ============================================================================
// NEO FEED
// ============================================================================

/// `GET /neo/rest/v1/feed`
#[derive(Debug, Clone, Deserialize)]
pub struct NeoFeedResponse {
    #[serde(default)]
    pub element_count: Option<u64>,
    /// Keyed by `YYYY-MM-DD`, so iteration is in date order.
    #[serde(default)]
    pub near_earth_objects: BTreeMap<String, Vec<WireNeo>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireNeo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub absolute_magnitude_h: Option<f64>,
    pub estimated_diameter: WireDiameters,
    #[serde(default)]
    pub is_potentially_hazardous_asteroid: bool,
    #[serde(default)]
    pub close_approach_data: Vec<WireCloseApproach>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireDiameters {
    pub kilometers: WireDiameterRange,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireDiameterRange {
    pub estimated_diameter_min: f64,
    pub estimated_diameter_max: f64,
}

/// Numeric fields arrive as strings.
#[derive(Debug, Clone, Deserialize)]
pub struct WireCloseApproach {
    pub close_approach_date: NaiveDate,
    pub relative_velocity: WireVelocity,
    pub miss_distance: WireMissDistance,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireVelocity {
    pub kilometers_per_second: String,
    pub kilometers_per_hour: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMissDistance {
    pub kilometers: String,
}

impl WireNeo {
    /// Domain record built from the first close approach. `None` when there
    /// is no approach data or a numeric field does not parse.
    pub fn into_record(self) -> Option<NeoRecord> {
        let approach = self.close_approach_data.into_iter().next()?;
        let parse = |s: &str| s.trim().parse::<f64>().ok();
        Some(NeoRecord {
            miss_distance_km: parse(&approach.miss_distance.kilometers)?,
            relative_velocity_kmh: parse(&approach.relative_velocity.kilometers_per_hour)?,
            relative_velocity_kps: parse(&approach.relative_velocity.kilometers_per_second)?,
            close_approach_date: approach.close_approach_date,
            id: self.id,
            name: self.name,
            absolute_magnitude: self.absolute_magnitude_h,
            estimated_diameter: EstimatedDiameter {
                min: self.estimated_diameter.kilometers.estimated_diameter_min,
                max: self.estimated_diameter.kilometers.estimated_diameter_max,
            },
            is_potentially_hazardous: self.is_potentially_hazardous_asteroid,
        })
    }
}

impl NeoFeedResponse {
    /// Every object across all dates, dropping those without usable
    /// close-approach data.
    pub fn into_records(self) -> Vec<NeoRecord> {
        let mut records = Vec::new();
        for (date, objects) in self.near_earth_objects {
            for neo in objects {
                let id = neo.id.clone();
                match neo.into_record() {
                    Some(record) => records.push(record),
                    None => tracing::debug!(date = %date, neo_id = %id, "Dropping NEO without usable approach data"),
                }
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manifest_keeps_duplicates_in_order() -> Result<(), serde_json::Error> {
        let raw = json!({
            "photo_manifest": {
                "name": "Curiosity",
                "max_sol": 7,
                "total_photos": 9,
                "photos": [
                    { "sol": 5, "earth_date": "2012-08-11", "total_photos": 3, "cameras": ["A"] },
                    { "sol": 5, "earth_date": "2012-08-11", "total_photos": 4, "cameras": ["A", "B"] },
                    { "sol": 7, "earth_date": "2012-08-13", "total_photos": 2, "cameras": ["C"] }
                ]
            }
        });
        let response: ManifestResponse = serde_json::from_value(raw.clone())?;
        let payload = ManifestPayload::from_response(&response, raw);
        let sols: Vec<_> = payload.records.iter().map(|r| r.period_key).collect();
        assert_eq!(sols, vec![5, 5, 7]);
        assert_eq!(payload.records[1].item_count, 4);
        assert!(payload.records[1].has_category("B"));
        Ok(())
    }

    #[test]
    fn test_apod_single_and_array() -> Result<(), serde_json::Error> {
        let single: ApodResponse = serde_json::from_value(json!({
            "date": "2024-03-15",
            "title": "The Orion Nebula",
            "url": "https://apod.nasa.gov/a.jpg",
            "explanation": "A nebula.",
            "media_type": "image",
            "copyright": "\nSomeone\n"
        }))?;
        let single = single.into_vec();
        assert_eq!(single.len(), 1);
        let record = ApodRecord::from(single[0].clone());
        assert_eq!(record.copyright.as_deref(), Some("Someone"));
        assert!(record.is_image());

        let many: ApodResponse = serde_json::from_value(json!([
            { "date": "2024-03-15", "title": "a", "url": "u", "explanation": "", "media_type": "image" },
            { "date": "2024-03-16", "title": "b", "explanation": "", "media_type": "video" }
        ]))?;
        let many = many.into_vec();
        assert_eq!(many.len(), 2);
        assert_eq!(ApodRecord::from(many[1].clone()).url, "");
        Ok(())
    }

    #[test]
    fn test_neo_feed_flattens_and_parses_numbers() -> Result<(), serde_json::Error> {
        let feed: NeoFeedResponse = serde_json::from_value(json!({
            "element_count": 2,
            "near_earth_objects": {
                "2024-03-16": [{
                    "id": "3542519",
                    "name": "(2010 PK9)",
                    "absolute_magnitude_h": 21.8,
                    "estimated_diameter": { "kilometers": { "estimated_diameter_min": 0.1, "estimated_diameter_max": 0.3 } },
                    "is_potentially_hazardous_asteroid": true,
                    "close_approach_data": [{
                        "close_approach_date": "2024-03-16",
                        "relative_velocity": { "kilometers_per_second": "12.5", "kilometers_per_hour": "45000.0" },
                        "miss_distance": { "kilometers": "7000000.25" }
                    }]
                }],
                "2024-03-15": [{
                    "id": "2000433",
                    "name": "433 Eros",
                    "estimated_diameter": { "kilometers": { "estimated_diameter_min": 20.0, "estimated_diameter_max": 40.0 } },
                    "close_approach_data": []
                }]
            }
        }))?;
        let records = feed.into_records();
        assert_eq!(records.len(), 1);
        let neo = &records[0];
        assert_eq!(neo.id, "3542519");
        assert_eq!(neo.miss_distance_km, 7000000.25);
        assert_eq!(neo.relative_velocity_kps, 12.5);
        assert!(neo.is_potentially_hazardous);
        Ok(())
    }
}
