//! Secondary indicators reported next to the risk score.
//!
//! These never feed the score or the level. Each one is only defined for
//! the datasets whose payload or factors carry its inputs.

use safewalk_accident_models::{DatasetType, HolidayPeriodType, TrafficVolumeLevel};

use crate::{count, multipliers, round2};

/// Area of the 100 m survey radius around a holiday hotspot, in m².
pub const HOLIDAY_SURVEY_AREA_M2: f64 = 31_416.0;

/// Area of the 150 m survey radius around a local-government hotspot, in m².
pub const LOCAL_GOVERNMENT_SURVEY_AREA_M2: f64 = 70_686.0;

/// Relative weight of an elderly pedestrian accident.
const ELDERLY_DENSITY_WEIGHT: f64 = 10.0;

/// Accidents per km² within the hotspot's survey radius.
///
/// Elderly hotspots have no published radius, so their density is a
/// relative figure (`accidents × 10`). Returns `None` for datasets without a
/// density.
#[must_use]
pub fn accident_density(dataset: DatasetType, accidents: Option<i64>) -> Option<f64> {
    let accidents = count(accidents);
    let density = match dataset {
        DatasetType::Holiday => accidents * 1_000_000.0 / HOLIDAY_SURVEY_AREA_M2,
        DatasetType::LocalGovernment => accidents * 1_000_000.0 / LOCAL_GOVERNMENT_SURVEY_AREA_M2,
        DatasetType::ElderlyPedestrian => accidents * ELDERLY_DENSITY_WEIGHT,
        DatasetType::Pedestrian | DatasetType::AccidentStatistics | DatasetType::LinkRiskArea => {
            return None;
        }
    };
    Some(round2(density))
}

/// `(4 - rank) × 100 + total_spots × 0.1` for a hotspot ranked in its
/// local government's top three.
#[must_use]
pub fn relative_risk_index(rank: Option<u8>, total_spots: Option<u32>) -> Option<f64> {
    match (rank, total_spots) {
        (Some(r @ 1..=3), Some(total)) => {
            Some(round2(f64::from(4 - r) * 100.0 + f64::from(total) * 0.1))
        }
        _ => None,
    }
}

/// `accidents × 10` scaled by the holiday period weight.
#[must_use]
pub fn tourism_impact_score(accidents: Option<i64>, period: Option<HolidayPeriodType>) -> f64 {
    round2(count(accidents) * 10.0 * multipliers::holiday_period(period))
}

/// Expected traffic volume during `period` relative to an ordinary day.
#[must_use]
pub const fn holiday_traffic_multiplier(period: Option<HolidayPeriodType>) -> f64 {
    match period {
        Some(HolidayPeriodType::NewYear | HolidayPeriodType::Chuseok) => 3.5,
        Some(HolidayPeriodType::SummerVacation) => 2.8,
        Some(HolidayPeriodType::SpringWeekend | HolidayPeriodType::AutumnWeekend) => 2.2,
        Some(HolidayPeriodType::Unknown) => 1.5,
        None => 1.0,
    }
}

/// Extra weekend risk during `period`.
#[must_use]
pub const fn weekend_risk_factor(period: Option<HolidayPeriodType>) -> f64 {
    match period {
        Some(HolidayPeriodType::SpringWeekend | HolidayPeriodType::AutumnWeekend) => 1.8,
        Some(HolidayPeriodType::SummerVacation) => 1.6,
        Some(_) => 1.3,
        None => 1.0,
    }
}

/// Traffic volume points plus `0.8 × speed limit`. `None` when neither is
/// known.
#[must_use]
pub fn traffic_flow_risk(volume: Option<TrafficVolumeLevel>, speed_kmh: Option<u32>) -> Option<f64> {
    if volume.is_none() && speed_kmh.is_none() {
        return None;
    }
    let volume_points = match volume {
        Some(TrafficVolumeLevel::VeryHigh) => 80.0,
        Some(TrafficVolumeLevel::High) => 60.0,
        Some(TrafficVolumeLevel::Medium) => 40.0,
        Some(TrafficVolumeLevel::Low) => 20.0,
        Some(TrafficVolumeLevel::VeryLow) => 10.0,
        None => 0.0,
    };
    let speed_points = speed_kmh.map_or(0.0, |s| f64::from(s) * 0.8);
    Some(round2(volume_points + speed_points))
}
