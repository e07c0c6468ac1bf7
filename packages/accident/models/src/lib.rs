#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Accident dataset types and risk classification shared across the
//! collector.
//!
//! Every record pulled from the KoROAD open data API belongs to exactly one
//! [`DatasetType`]. Each dataset type has its own endpoint, its own natural
//! key shape, and its own risk-score weighting, but they all end up as an
//! [`AccidentRecord`] annotated with [`DerivedRiskMetrics`].

pub mod raw;
pub mod record;
pub mod regions;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use raw::{AccidentCounts, HotspotItem, RawAccidentRecord, RiskAreaItem, StatisticsItem};
pub use record::{AccidentRecord, DerivedRiskMetrics, NaturalKey, RecordDetail, RiskFactors};
pub use regions::RegionCode;

/// One of the six accident data families collected from the API.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum DatasetType {
    /// Pedestrian accident hotspots
    Pedestrian,
    /// Elderly pedestrian accident hotspots
    ElderlyPedestrian,
    /// Hotspots ranked per local government
    LocalGovernment,
    /// Hotspots during holiday travel periods
    Holiday,
    /// Jurisdiction-level accident statistics
    AccidentStatistics,
    /// Link (road segment) based risk areas
    LinkRiskArea,
}

/// Which raw payload shape a dataset's endpoint returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RecordShape {
    /// Point hotspot with an `afos_id`.
    Hotspot,
    /// Per-district statistics table row.
    Statistics,
    /// Road-link polygon with a cause list.
    RiskArea,
}

impl DatasetType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Pedestrian,
            Self::ElderlyPedestrian,
            Self::LocalGovernment,
            Self::Holiday,
            Self::AccidentStatistics,
            Self::LinkRiskArea,
        ]
    }

    /// Returns the shape of raw records this dataset's endpoint returns.
    #[must_use]
    pub const fn shape(self) -> RecordShape {
        match self {
            Self::Pedestrian | Self::ElderlyPedestrian | Self::LocalGovernment | Self::Holiday => {
                RecordShape::Hotspot
            }
            Self::AccidentStatistics => RecordShape::Statistics,
            Self::LinkRiskArea => RecordShape::RiskArea,
        }
    }

    /// Human-readable (Korean) dataset name as published by KoROAD.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pedestrian => "보행자 사고다발지역정보",
            Self::ElderlyPedestrian => "보행노인 사고다발지역정보",
            Self::LocalGovernment => "지자체별 사고다발지역정보",
            Self::Holiday => "연휴기간별 사고다발지역정보",
            Self::AccidentStatistics => "지자체별 대상사고통계",
            Self::LinkRiskArea => "링크기반 사고위험지역정보",
        }
    }

    /// Describes the field(s) that make up this dataset's natural key.
    #[must_use]
    pub const fn natural_key_field(self) -> &'static str {
        match self.shape() {
            RecordShape::Hotspot => "afos_id",
            RecordShape::Statistics => "sido+gugun+year",
            RecordShape::RiskArea => "link_id",
        }
    }
}

/// Discrete five-band risk classification, from 1 (very low) to 5
/// (very high).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Below every dataset threshold
    VeryLow = 1,
    /// Low risk
    Low = 2,
    /// Medium risk
    Medium = 3,
    /// High risk
    High = 4,
    /// Very high risk
    VeryHigh = 5,
}

impl RiskLevel {
    /// Returns the numeric value of this level.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Creates a risk level from a numeric value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not in the range 1-5.
    pub const fn from_value(value: u8) -> Result<Self, InvalidRiskLevelError> {
        match value {
            1 => Ok(Self::VeryLow),
            2 => Ok(Self::Low),
            3 => Ok(Self::Medium),
            4 => Ok(Self::High),
            5 => Ok(Self::VeryHigh),
            _ => Err(InvalidRiskLevelError { value }),
        }
    }

    /// Maps the API's four-step analysis grade (`anals_grd`, 1 = safe,
    /// 4 = very dangerous) onto this scale.
    ///
    /// Returns `None` for missing or out-of-range grades.
    #[must_use]
    pub const fn from_api_grade(grade: i64) -> Option<Self> {
        match grade {
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            4 => Some(Self::VeryHigh),
            _ => None,
        }
    }

    /// Returns all variants, lowest first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::VeryLow,
            Self::Low,
            Self::Medium,
            Self::High,
            Self::VeryHigh,
        ]
    }
}

/// Error returned when attempting to create a [`RiskLevel`] from an invalid
/// numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRiskLevelError {
    /// The invalid value that was provided.
    pub value: u8,
}

impl std::fmt::Display for InvalidRiskLevelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid risk level {}: expected 1-5", self.value)
    }
}

impl std::error::Error for InvalidRiskLevelError {}

/// Holiday period a holiday-dataset hotspot was observed in.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HolidayPeriodType {
    /// Lunar new year (설날)
    NewYear,
    /// Chuseok harvest festival (추석)
    Chuseok,
    /// Summer vacation season
    SummerVacation,
    /// Spring long weekends
    SpringWeekend,
    /// Autumn long weekends
    AutumnWeekend,
    /// Not derivable from the record
    #[default]
    Unknown,
}

impl HolidayPeriodType {
    /// Whether this is one of the two national peak travel holidays.
    #[must_use]
    pub const fn is_peak(self) -> bool {
        matches!(self, Self::NewYear | Self::Chuseok)
    }

    /// Season the holiday period falls into.
    #[must_use]
    pub const fn season(self) -> SeasonalCategory {
        match self {
            Self::NewYear => SeasonalCategory::Winter,
            Self::SpringWeekend => SeasonalCategory::Spring,
            Self::SummerVacation => SeasonalCategory::Summer,
            Self::Chuseok | Self::AutumnWeekend => SeasonalCategory::Autumn,
            Self::Unknown => SeasonalCategory::Unknown,
        }
    }
}

/// Season bucket for holiday hotspots.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SeasonalCategory {
    /// December through February
    Winter,
    /// March through May
    Spring,
    /// June through August
    Summer,
    /// September through November
    Autumn,
    /// Holiday period unknown
    Unknown,
}

/// Tourism-oriented interpretation of a holiday hotspot's risk level.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SeasonalRiskLevel {
    /// High risk during a peak travel holiday
    PeakTourism,
    /// High risk during an ordinary holiday period
    HighTraffic,
    /// Medium risk
    NormalHoliday,
    /// Low risk
    LowRisk,
    /// Very low risk
    MinimalRisk,
}

/// Road classification for link-based risk areas.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RoadType {
    /// Expressway
    Highway,
    /// Arterial road
    Arterial,
    /// National road
    National,
    /// Urban road
    Urban,
    /// Provincial road
    Provincial,
    /// Collector road
    Collector,
    /// Local road
    Local,
    /// Residential street
    LocalStreet,
}

/// Relative traffic volume band for a road link.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TrafficVolumeLevel {
    /// Very high volume
    VeryHigh,
    /// High volume
    High,
    /// Medium volume
    Medium,
    /// Low volume
    Low,
    /// Very low volume
    VeryLow,
}

/// Urbanization level of a jurisdiction.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum UrbanLevel {
    /// City core
    Urban,
    /// Suburban
    Suburban,
    /// Rural
    Rural,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn dataset_type_roundtrip() {
        for dataset in DatasetType::all() {
            let s = dataset.to_string();
            let parsed = DatasetType::from_str(&s).unwrap();
            assert_eq!(*dataset, parsed);
        }
    }

    #[test]
    fn dataset_type_parses_lowercase() {
        assert_eq!(
            DatasetType::from_str("link_risk_area").unwrap(),
            DatasetType::LinkRiskArea
        );
        assert_eq!(
            DatasetType::from_str("pedestrian").unwrap(),
            DatasetType::Pedestrian
        );
    }

    #[test]
    fn hotspot_datasets_share_shape() {
        let hotspots = DatasetType::all()
            .iter()
            .filter(|d| d.shape() == RecordShape::Hotspot)
            .count();
        assert_eq!(hotspots, 4);
        assert_eq!(
            DatasetType::AccidentStatistics.shape(),
            RecordShape::Statistics
        );
        assert_eq!(DatasetType::LinkRiskArea.natural_key_field(), "link_id");
    }

    #[test]
    fn risk_level_ordering() {
        assert!(RiskLevel::VeryHigh > RiskLevel::High);
        assert!(RiskLevel::Low > RiskLevel::VeryLow);
        let levels = RiskLevel::all();
        assert!(levels.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn risk_level_value_roundtrip() {
        for level in RiskLevel::all() {
            assert_eq!(RiskLevel::from_value(level.value()).unwrap(), *level);
        }
        assert!(RiskLevel::from_value(0).is_err());
        assert!(RiskLevel::from_value(6).is_err());
    }

    #[test]
    fn api_grade_mapping() {
        assert_eq!(RiskLevel::from_api_grade(1), Some(RiskLevel::Low));
        assert_eq!(RiskLevel::from_api_grade(4), Some(RiskLevel::VeryHigh));
        assert_eq!(RiskLevel::from_api_grade(0), None);
        assert_eq!(RiskLevel::from_api_grade(9), None);
    }

    #[test]
    fn holiday_seasons() {
        assert_eq!(HolidayPeriodType::NewYear.season(), SeasonalCategory::Winter);
        assert_eq!(HolidayPeriodType::Chuseok.season(), SeasonalCategory::Autumn);
        assert_eq!(
            HolidayPeriodType::AutumnWeekend.season(),
            SeasonalCategory::Autumn
        );
        assert!(HolidayPeriodType::Chuseok.is_peak());
        assert!(!HolidayPeriodType::SummerVacation.is_peak());
    }

    #[test]
    fn risk_level_serializes_screaming_snake() {
        let json = serde_json::to_string(&RiskLevel::VeryHigh).unwrap();
        assert_eq!(json, "\"VERY_HIGH\"");
    }
}
