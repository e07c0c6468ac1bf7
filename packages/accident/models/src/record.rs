//! The persistable, risk-annotated accident record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AccidentCounts, DatasetType, HolidayPeriodType, RegionCode, RiskLevel, RoadType,
    SeasonalCategory, SeasonalRiskLevel, TrafficVolumeLevel, UrbanLevel,
};

/// Derived risk metrics, recomputed from counts on every mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedRiskMetrics {
    /// `deaths / casualties × 100`, rounded to 2 decimals.
    pub fatality_rate: f64,
    /// `(deaths + serious) / casualties × 100`, rounded to 2 decimals.
    pub serious_injury_rate: f64,
    /// Dataset-specific weighted score, rounded to 2 decimals.
    pub risk_score: f64,
    pub risk_level: RiskLevel,
}

/// Categorical inputs that scale a dataset's base risk score.
///
/// Any factor left as `None` contributes a multiplier of `1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactors {
    /// Top-3 rank within a local government (1 = worst).
    pub local_rank: Option<u8>,
    /// Hotspots the local government published in total.
    pub local_total_spots: Option<u32>,
    pub holiday_period: Option<HolidayPeriodType>,
    /// Resident population of the jurisdiction.
    pub population: Option<i64>,
    pub urban_level: Option<UrbanLevel>,
    pub road_type: Option<RoadType>,
    pub traffic_volume: Option<TrafficVolumeLevel>,
    /// Posted speed limit in km/h.
    pub speed_limit_kmh: Option<u32>,
}

/// Uniqueness key for a persisted record.
///
/// The `key` component depends on the dataset: the hotspot `afos_id`, the
/// risk-area link name, or the district/year pair for statistics rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NaturalKey {
    pub dataset_type: DatasetType,
    pub key: String,
    pub province_code: String,
    pub district_code: String,
    pub year: String,
}

impl NaturalKey {
    /// Builds a key for `key` in the given region and year.
    #[must_use]
    pub fn new(dataset_type: DatasetType, key: &str, region: &RegionCode, year: &str) -> Self {
        Self {
            dataset_type,
            key: key.to_string(),
            province_code: region.province_code.clone(),
            district_code: region.district_code.clone(),
            year: year.to_string(),
        }
    }

    /// Key for a statistics row. One row is kept per district and year;
    /// the accident classification is detail, not identity.
    #[must_use]
    pub fn statistics(region: &RegionCode, year: &str) -> Self {
        let key = format!("{}-{}-{year}", region.province_code, region.district_code);
        Self::new(DatasetType::AccidentStatistics, &key, region, year)
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}@{}-{}/{}",
            self.dataset_type, self.key, self.province_code, self.district_code, self.year
        )
    }
}

/// Point hotspot fields shared by the four hotspot datasets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotDetail {
    pub feature_id: Option<i64>,
    pub legal_dong_code: Option<String>,
    pub spot_code: Option<String>,
    pub spot_name: Option<String>,
    pub region_name: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub geometry_json: Option<String>,
    /// Accidents per km² of the survey radius (relative for elderly
    /// hotspots).
    pub accident_density: Option<f64>,
    /// Rank-based index within a local government.
    pub relative_risk_index: Option<f64>,
}

/// Law-violation and accident-type breakdown of a statistics row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsDetail {
    pub classification: Option<String>,
    pub region_name: Option<String>,
    /// Fatality rate exactly as published (may differ from the derived one).
    pub published_fatality_rate: Option<f64>,
    pub accident_count_ratio: Option<f64>,
    pub death_count_ratio: Option<f64>,
    pub injured_count_ratio: Option<f64>,
    pub total_accident_count: Option<i64>,
    pub total_death_count: Option<i64>,
    pub total_injured_count: Option<i64>,
    pub per_100k_population: Option<f64>,
    pub per_10k_vehicles: Option<f64>,
    /// Population implied by `accident_count` and `per_100k_population`.
    pub estimated_population: Option<i64>,
    pub speeding: Option<i64>,
    pub center_line_violation: Option<i64>,
    pub signal_violation: Option<i64>,
    pub safe_distance_violation: Option<i64>,
    pub unsafe_driving: Option<i64>,
    pub intersection_violation: Option<i64>,
    pub pedestrian_protection_violation: Option<i64>,
    pub other_violation: Option<i64>,
    pub vehicle_vs_pedestrian: Option<i64>,
    pub vehicle_vs_vehicle: Option<i64>,
    pub single_vehicle: Option<i64>,
    pub railway_crossing: Option<i64>,
}

/// Link-based risk area fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAreaDetail {
    pub area_name: Option<String>,
    pub causes: Vec<String>,
    pub center_utmk_x: Option<f64>,
    pub center_utmk_y: Option<f64>,
    pub geometry_wkt: Option<String>,
    /// Traffic volume and speed limit points.
    pub traffic_flow_risk: Option<f64>,
}

/// Dataset-specific part of an [`AccidentRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordDetail {
    Hotspot(HotspotDetail),
    Holiday {
        hotspot: HotspotDetail,
        period: HolidayPeriodType,
        season: SeasonalCategory,
        seasonal_risk: SeasonalRiskLevel,
        tourism_impact_score: f64,
        traffic_multiplier: f64,
        weekend_risk_factor: f64,
    },
    Statistics(StatisticsDetail),
    RiskArea(RiskAreaDetail),
}

/// A normalized accident record ready for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccidentRecord {
    pub natural_key: NaturalKey,
    pub region: RegionCode,
    pub year: String,
    pub counts: AccidentCounts,
    pub factors: RiskFactors,
    pub risk: DerivedRiskMetrics,
    pub detail: RecordDetail,
    pub collected_at: DateTime<Utc>,
}

impl AccidentRecord {
    #[must_use]
    pub const fn dataset_type(&self) -> DatasetType {
        self.natural_key.dataset_type
    }

    /// WGS84 coordinates, when the record carries a point location.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let hotspot = match &self.detail {
            RecordDetail::Hotspot(h) | RecordDetail::Holiday { hotspot: h, .. } => h,
            RecordDetail::Statistics(_) | RecordDetail::RiskArea(_) => return None,
        };
        match (hotspot.longitude, hotspot.latitude) {
            (Some(lng), Some(lat)) => Some((lng, lat)),
            _ => None,
        }
    }
}
