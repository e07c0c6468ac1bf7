//! Raw record → [`AccidentRecord`] mapping.
//!
//! Mapping is pure: it combines the raw payload, the region/year the record
//! was fetched for, and the dataset's [`RiskScorer`] output. It never fails;
//! missing fields stay `None`. Records that cannot be persisted at all (no
//! natural key, wrong payload shape) are caught earlier by
//! [`RecordMapper::validate`].

use chrono::{DateTime, Utc};
use safewalk_accident_models::{
    AccidentRecord, DatasetType, HotspotItem, NaturalKey, RawAccidentRecord, RecordDetail,
    RecordShape, RegionCode, RiskAreaItem, RiskFactors, StatisticsItem,
    raw::parse_cause_list,
    record::{HotspotDetail, RiskAreaDetail, StatisticsDetail},
};
use safewalk_risk::{RiskScorer, indicators, seasonal_risk};

/// Why a raw record was rejected before mapping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("{dataset}: record has no {field}")]
    MissingKey {
        dataset: DatasetType,
        field: &'static str,
    },
    #[error("{dataset}: expected a {expected} record, got {found}")]
    ShapeMismatch {
        dataset: DatasetType,
        expected: RecordShape,
        found: RecordShape,
    },
}

/// Maps raw records of one dataset type.
#[derive(Debug, Clone, Copy)]
pub struct RecordMapper {
    dataset: DatasetType,
    scorer: RiskScorer,
    factors: RiskFactors,
}

impl RecordMapper {
    /// Mapper for `dataset` with no categorical risk factors.
    #[must_use]
    pub const fn new(dataset: DatasetType) -> Self {
        Self {
            dataset,
            scorer: RiskScorer::for_dataset(dataset),
            factors: RiskFactors {
                local_rank: None,
                local_total_spots: None,
                holiday_period: None,
                population: None,
                urban_level: None,
                road_type: None,
                traffic_volume: None,
                speed_limit_kmh: None,
            },
        }
    }

    /// Applies `factors` to every record this mapper scores.
    #[must_use]
    pub const fn with_factors(mut self, factors: RiskFactors) -> Self {
        self.factors = factors;
        self
    }

    #[must_use]
    pub const fn dataset(&self) -> DatasetType {
        self.dataset
    }

    /// Checks that `raw` can be persisted under this dataset.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError`] if the payload shape does not belong to this
    /// dataset or the natural key field is missing or blank.
    pub fn validate(&self, raw: &RawAccidentRecord) -> Result<(), MappingError> {
        let expected = self.dataset.shape();
        if raw.shape() != expected {
            return Err(MappingError::ShapeMismatch {
                dataset: self.dataset,
                expected,
                found: raw.shape(),
            });
        }

        let key = match raw {
            RawAccidentRecord::Hotspot(item) => item.afos_id.as_deref(),
            RawAccidentRecord::RiskArea(item) => item.area_name.as_deref(),
            RawAccidentRecord::Statistics(_) => return Ok(()),
        };
        if key.is_some_and(|k| !k.trim().is_empty()) {
            Ok(())
        } else {
            Err(MappingError::MissingKey {
                dataset: self.dataset,
                field: self.dataset.natural_key_field(),
            })
        }
    }

    /// Maps `raw`, stamped with the current time.
    #[must_use]
    pub fn map(&self, raw: &RawAccidentRecord, region: &RegionCode, year: &str) -> AccidentRecord {
        self.map_at(raw, region, year, Utc::now())
    }

    /// Maps `raw` with an explicit collection timestamp.
    #[must_use]
    pub fn map_at(
        &self,
        raw: &RawAccidentRecord,
        region: &RegionCode,
        year: &str,
        collected_at: DateTime<Utc>,
    ) -> AccidentRecord {
        let counts = raw.counts();
        let mut factors = self.factors;

        let (natural_key, detail) = match raw {
            RawAccidentRecord::Hotspot(item) => self.hotspot(item, &factors, region, year),
            RawAccidentRecord::Statistics(item) => {
                let detail = statistics_detail(item);
                if factors.population.is_none() {
                    factors.population = detail.estimated_population;
                }
                (
                    NaturalKey::statistics(region, year),
                    RecordDetail::Statistics(detail),
                )
            }
            RawAccidentRecord::RiskArea(item) => (
                NaturalKey::new(
                    self.dataset,
                    item.area_name.as_deref().unwrap_or_default().trim(),
                    region,
                    year,
                ),
                RecordDetail::RiskArea(risk_area_detail(item, &factors)),
            ),
        };

        let risk = self.scorer.score(&counts, &factors);

        let detail = match detail {
            RecordDetail::Hotspot(hotspot) if self.dataset == DatasetType::Holiday => {
                let period = factors.holiday_period.unwrap_or_default();
                RecordDetail::Holiday {
                    hotspot,
                    period,
                    season: period.season(),
                    seasonal_risk: seasonal_risk(risk.risk_level, period),
                    tourism_impact_score: indicators::tourism_impact_score(
                        counts.accidents,
                        factors.holiday_period,
                    ),
                    traffic_multiplier: indicators::holiday_traffic_multiplier(
                        factors.holiday_period,
                    ),
                    weekend_risk_factor: indicators::weekend_risk_factor(factors.holiday_period),
                }
            }
            other => other,
        };

        AccidentRecord {
            natural_key,
            region: region.clone(),
            year: year.to_string(),
            counts,
            factors,
            risk,
            detail,
            collected_at,
        }
    }

    fn hotspot(
        &self,
        item: &HotspotItem,
        factors: &RiskFactors,
        region: &RegionCode,
        year: &str,
    ) -> (NaturalKey, RecordDetail) {
        let key = NaturalKey::new(
            self.dataset,
            item.afos_id.as_deref().unwrap_or_default().trim(),
            region,
            year,
        );
        let detail = HotspotDetail {
            feature_id: item.feature_id,
            legal_dong_code: item.legal_dong_code.clone(),
            spot_code: item.spot_code.clone(),
            spot_name: item.spot_name.clone(),
            region_name: item.region_name.clone(),
            longitude: item.longitude,
            latitude: item.latitude,
            geometry_json: item.geometry_json.clone(),
            accident_density: indicators::accident_density(self.dataset, item.accident_count),
            relative_risk_index: match self.dataset {
                DatasetType::LocalGovernment => {
                    indicators::relative_risk_index(factors.local_rank, factors.local_total_spots)
                }
                _ => None,
            },
        };
        (key, RecordDetail::Hotspot(detail))
    }
}

fn statistics_detail(item: &StatisticsItem) -> StatisticsDetail {
    StatisticsDetail {
        classification: item.classification.clone(),
        region_name: item.region_name.clone(),
        published_fatality_rate: item.fatality_rate,
        accident_count_ratio: item.accident_count_ratio,
        death_count_ratio: item.death_count_ratio,
        injured_count_ratio: item.injured_count_ratio,
        total_accident_count: item.total_accident_count,
        total_death_count: item.total_death_count,
        total_injured_count: item.total_injured_count,
        per_100k_population: item.per_100k_population,
        per_10k_vehicles: item.per_10k_vehicles,
        estimated_population: estimate_population(item.accident_count, item.per_100k_population),
        speeding: item.speeding_count,
        center_line_violation: item.center_line_violation_count,
        signal_violation: item.signal_violation_count,
        safe_distance_violation: item.safe_distance_violation_count,
        unsafe_driving: item.unsafe_driving_count,
        intersection_violation: item.intersection_violation_count,
        pedestrian_protection_violation: item.pedestrian_protection_violation_count,
        other_violation: item.other_violation_count,
        vehicle_vs_pedestrian: item.vehicle_vs_pedestrian_count,
        vehicle_vs_vehicle: item.vehicle_vs_vehicle_count,
        single_vehicle: item.single_vehicle_count,
        railway_crossing: item.railway_crossing_count,
    }
}

fn risk_area_detail(item: &RiskAreaItem, factors: &RiskFactors) -> RiskAreaDetail {
    RiskAreaDetail {
        area_name: item.area_name.clone(),
        causes: parse_cause_list(item.cause_analysis.as_deref()),
        center_utmk_x: item.center_utmk_x,
        center_utmk_y: item.center_utmk_y,
        geometry_wkt: item.geometry_wkt.clone(),
        traffic_flow_risk: indicators::traffic_flow_risk(
            factors.traffic_volume,
            factors.speed_limit_kmh,
        ),
    }
}

/// Population implied by an accident count and its per-100k rate.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn estimate_population(accidents: Option<i64>, per_100k: Option<f64>) -> Option<i64> {
    let accidents = accidents.filter(|a| *a > 0)?;
    let rate = per_100k.filter(|r| r.is_finite() && *r > 0.0)?;
    Some((accidents as f64 * 100_000.0 / rate).round() as i64)
}
