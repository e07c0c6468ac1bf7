//! Categorical multipliers applied on top of a dataset's base score.
//!
//! Every function returns `1.0` when its input is unknown.

use safewalk_accident_models::{
    DatasetType, HolidayPeriodType, RiskFactors, RoadType, TrafficVolumeLevel, UrbanLevel,
};

/// Local-government hotspots ranked in a district's top three get
/// `4 - rank`, so rank 1 triples the score.
#[must_use]
pub fn local_rank(rank: Option<u8>) -> f64 {
    match rank {
        Some(r @ 1..=3) => f64::from(4 - r),
        _ => 1.0,
    }
}

#[must_use]
pub const fn holiday_period(period: Option<HolidayPeriodType>) -> f64 {
    match period {
        Some(HolidayPeriodType::NewYear | HolidayPeriodType::Chuseok) => 2.0,
        Some(HolidayPeriodType::SummerVacation) => 1.8,
        Some(HolidayPeriodType::SpringWeekend | HolidayPeriodType::AutumnWeekend) => 1.5,
        Some(HolidayPeriodType::Unknown) | None => 1.0,
    }
}

#[must_use]
pub const fn population(population: Option<i64>) -> f64 {
    match population {
        Some(p) if p >= 1_000_000 => 1.5,
        Some(p) if p >= 500_000 => 1.3,
        Some(p) if p >= 100_000 => 1.1,
        _ => 1.0,
    }
}

#[must_use]
pub const fn urban_level(level: Option<UrbanLevel>) -> f64 {
    match level {
        Some(UrbanLevel::Urban) => 1.4,
        Some(UrbanLevel::Suburban) => 1.2,
        Some(UrbanLevel::Rural) | None => 1.0,
    }
}

#[must_use]
pub const fn road_type(road: Option<RoadType>) -> f64 {
    match road {
        Some(RoadType::Highway) => 2.5,
        Some(RoadType::Arterial | RoadType::National) => 2.0,
        Some(RoadType::Urban | RoadType::Provincial) => 1.5,
        Some(RoadType::Collector | RoadType::Local) => 1.2,
        Some(RoadType::LocalStreet) | None => 1.0,
    }
}

#[must_use]
pub const fn traffic_volume(volume: Option<TrafficVolumeLevel>) -> f64 {
    match volume {
        Some(TrafficVolumeLevel::VeryHigh) => 2.0,
        Some(TrafficVolumeLevel::High) => 1.6,
        Some(TrafficVolumeLevel::Medium) => 1.3,
        Some(TrafficVolumeLevel::Low) => 1.1,
        Some(TrafficVolumeLevel::VeryLow) | None => 1.0,
    }
}

#[must_use]
pub const fn speed_limit(kmh: Option<u32>) -> f64 {
    match kmh {
        Some(s) if s >= 100 => 2.0,
        Some(s) if s >= 80 => 1.7,
        Some(s) if s >= 60 => 1.4,
        Some(s) if s >= 50 => 1.2,
        _ => 1.0,
    }
}

/// Combined multiplier for `dataset`. Factors that do not apply to the
/// dataset are ignored.
#[must_use]
pub fn combined(dataset: DatasetType, factors: &RiskFactors) -> f64 {
    match dataset {
        DatasetType::Pedestrian | DatasetType::ElderlyPedestrian => 1.0,
        DatasetType::LocalGovernment => local_rank(factors.local_rank),
        DatasetType::Holiday => holiday_period(factors.holiday_period),
        DatasetType::AccidentStatistics => {
            population(factors.population) * urban_level(factors.urban_level)
        }
        DatasetType::LinkRiskArea => {
            road_type(factors.road_type)
                * traffic_volume(factors.traffic_volume)
                * speed_limit(factors.speed_limit_kmh)
        }
    }
}
