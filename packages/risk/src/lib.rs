#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Accident risk scoring.
//!
//! A [`RiskScorer`] turns a record's severity counts into
//! [`DerivedRiskMetrics`]. The score is always a linear combination of
//! severity-weighted counts scaled by the dataset's categorical multipliers,
//! but the weights and level thresholds are specific to each
//! [`DatasetType`]: elderly and holiday hotspots see far smaller volumes
//! than jurisdiction statistics, so they are banded differently.
//!
//! All arithmetic is done unrounded; only the outputs are rounded to two
//! decimals. The level is classified from the rounded score, so a stored
//! score and its level always agree. Missing counts are treated as zero.

pub mod indicators;
pub mod multipliers;

use safewalk_accident_models::{
    AccidentCounts, DatasetType, DerivedRiskMetrics, HolidayPeriodType, RiskFactors, RiskLevel,
    SeasonalRiskLevel,
};

/// Per-unit weights of the base score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub accident: f64,
    pub casualty: f64,
    /// Applied to the fatality rate (percent), not the death count.
    pub fatality_rate: f64,
    pub death: f64,
    pub serious_injury: f64,
}

/// Minimum score for each level above [`RiskLevel::VeryLow`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub very_high: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Thresholds {
    #[must_use]
    pub fn classify(&self, score: f64) -> RiskLevel {
        if score >= self.very_high {
            RiskLevel::VeryHigh
        } else if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else if score >= self.low {
            RiskLevel::Low
        } else {
            RiskLevel::VeryLow
        }
    }
}

/// Weights and thresholds for one dataset type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskProfile {
    pub weights: Weights,
    pub thresholds: Thresholds,
}

impl RiskProfile {
    #[must_use]
    pub const fn for_dataset(dataset: DatasetType) -> Self {
        match dataset {
            DatasetType::Pedestrian => Self::new((1.0, 1.5, 2.0, 0.0, 0.0), (100.0, 50.0, 20.0, 5.0)),
            DatasetType::ElderlyPedestrian => {
                Self::new((3.0, 2.5, 0.0, 15.0, 8.0), (200.0, 120.0, 60.0, 20.0))
            }
            DatasetType::LocalGovernment => {
                Self::new((2.5, 2.0, 0.0, 10.0, 5.0), (300.0, 200.0, 100.0, 50.0))
            }
            DatasetType::Holiday => {
                Self::new((4.0, 3.0, 0.0, 20.0, 8.0), (400.0, 250.0, 120.0, 60.0))
            }
            DatasetType::AccidentStatistics => {
                Self::new((1.0, 1.5, 0.0, 8.0, 3.0), (10_000.0, 5_000.0, 2_000.0, 500.0))
            }
            DatasetType::LinkRiskArea => {
                Self::new((3.0, 2.5, 0.0, 15.0, 8.0), (500.0, 300.0, 150.0, 50.0))
            }
        }
    }

    const fn new(
        (accident, casualty, fatality_rate, death, serious_injury): (f64, f64, f64, f64, f64),
        (very_high, high, medium, low): (f64, f64, f64, f64),
    ) -> Self {
        Self {
            weights: Weights {
                accident,
                casualty,
                fatality_rate,
                death,
                serious_injury,
            },
            thresholds: Thresholds {
                very_high,
                high,
                medium,
                low,
            },
        }
    }
}

/// Scores records of a single dataset type.
#[derive(Debug, Clone, Copy)]
pub struct RiskScorer {
    dataset: DatasetType,
    profile: RiskProfile,
}

impl RiskScorer {
    #[must_use]
    pub const fn for_dataset(dataset: DatasetType) -> Self {
        Self {
            dataset,
            profile: RiskProfile::for_dataset(dataset),
        }
    }

    #[must_use]
    pub const fn dataset(&self) -> DatasetType {
        self.dataset
    }

    #[must_use]
    pub const fn profile(&self) -> &RiskProfile {
        &self.profile
    }

    /// Unrounded risk score.
    #[must_use]
    pub fn raw_score(&self, counts: &AccidentCounts, factors: &RiskFactors) -> f64 {
        let w = &self.profile.weights;
        let base = count(counts.accidents) * w.accident
            + count(counts.casualties) * w.casualty
            + fatality_rate(counts) * w.fatality_rate
            + count(counts.deaths) * w.death
            + count(counts.serious_injuries) * w.serious_injury;

        base * multipliers::combined(self.dataset, factors)
    }

    /// Computes all derived metrics for one record.
    #[must_use]
    pub fn score(&self, counts: &AccidentCounts, factors: &RiskFactors) -> DerivedRiskMetrics {
        let risk_score = round2(self.raw_score(counts, factors));
        DerivedRiskMetrics {
            fatality_rate: round2(fatality_rate(counts)),
            serious_injury_rate: round2(serious_injury_rate(counts)),
            risk_score,
            risk_level: self.profile.thresholds.classify(risk_score),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn count(value: Option<i64>) -> f64 {
    value.unwrap_or(0).max(0) as f64
}

/// `deaths / casualties × 100`, or `0` when there are no casualties.
#[must_use]
pub fn fatality_rate(counts: &AccidentCounts) -> f64 {
    let casualties = count(counts.casualties);
    if casualties <= 0.0 {
        return 0.0;
    }
    count(counts.deaths) / casualties * 100.0
}

/// `(deaths + serious) / casualties × 100`, or `0` when there are no
/// casualties.
#[must_use]
pub fn serious_injury_rate(counts: &AccidentCounts) -> f64 {
    let casualties = count(counts.casualties);
    if casualties <= 0.0 {
        return 0.0;
    }
    (count(counts.deaths) + count(counts.serious_injuries)) / casualties * 100.0
}

/// Rounds half away from zero to two decimals.
#[must_use]
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

/// Tourism-oriented reading of a holiday hotspot's level.
#[must_use]
pub const fn seasonal_risk(level: RiskLevel, period: HolidayPeriodType) -> SeasonalRiskLevel {
    match level {
        RiskLevel::VeryHigh | RiskLevel::High if period.is_peak() => SeasonalRiskLevel::PeakTourism,
        RiskLevel::VeryHigh | RiskLevel::High => SeasonalRiskLevel::HighTraffic,
        RiskLevel::Medium => SeasonalRiskLevel::NormalHoliday,
        RiskLevel::Low => SeasonalRiskLevel::LowRisk,
        RiskLevel::VeryLow => SeasonalRiskLevel::MinimalRisk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(acc: i64, cas: i64, deaths: i64, serious: i64) -> AccidentCounts {
        AccidentCounts {
            accidents: Some(acc),
            casualties: Some(cas),
            deaths: Some(deaths),
            serious_injuries: Some(serious),
            minor_injuries: None,
            injury_reports: None,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn pedestrian_example() {
        let scorer = RiskScorer::for_dataset(DatasetType::Pedestrian);
        let metrics = scorer.score(&counts(10, 12, 2, 3), &RiskFactors::default());

        assert!(approx(metrics.fatality_rate, 16.67));
        assert!(approx(metrics.serious_injury_rate, 41.67));
        // 10 + 18 + 16.666.. × 2
        assert!(approx(metrics.risk_score, 61.33));
        assert_eq!(metrics.risk_level, RiskLevel::High);
    }

    #[test]
    fn all_null_counts_score_zero() {
        for dataset in DatasetType::all() {
            let metrics =
                RiskScorer::for_dataset(*dataset).score(&AccidentCounts::default(), &RiskFactors::default());
            assert!(approx(metrics.fatality_rate, 0.0));
            assert!(approx(metrics.serious_injury_rate, 0.0));
            assert!(approx(metrics.risk_score, 0.0));
            assert_eq!(metrics.risk_level, RiskLevel::VeryLow, "{dataset}");
        }
    }

    #[test]
    fn zero_casualties_do_not_divide() {
        let c = counts(5, 0, 3, 1);
        assert!(approx(fatality_rate(&c), 0.0));
        assert!(approx(serious_injury_rate(&c), 0.0));
    }

    #[test]
    fn more_deaths_never_lowers_risk() {
        let factors = RiskFactors::default();
        for dataset in DatasetType::all() {
            let scorer = RiskScorer::for_dataset(*dataset);
            let mut previous = scorer.score(&counts(20, 30, 0, 4), &factors);
            for deaths in 1..=30 {
                let next = scorer.score(&counts(20, 30, deaths, 4), &factors);
                assert!(next.fatality_rate >= previous.fatality_rate, "{dataset}");
                assert!(next.risk_score >= previous.risk_score, "{dataset}");
                assert!(next.risk_level >= previous.risk_level, "{dataset}");
                previous = next;
            }
        }
    }

    #[test]
    fn elderly_uses_death_and_serious_weights() {
        let scorer = RiskScorer::for_dataset(DatasetType::ElderlyPedestrian);
        // 3×10 + 2.5×12 + 15×2 + 8×3 = 114
        let metrics = scorer.score(&counts(10, 12, 2, 3), &RiskFactors::default());
        assert!(approx(metrics.risk_score, 114.0));
        assert_eq!(metrics.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn local_government_rank_scales_score() {
        let scorer = RiskScorer::for_dataset(DatasetType::LocalGovernment);
        let c = counts(10, 12, 2, 3);
        // 25 + 24 + 20 + 15 = 84
        let unranked = scorer.score(&c, &RiskFactors::default());
        assert!(approx(unranked.risk_score, 84.0));
        assert_eq!(unranked.risk_level, RiskLevel::Low);

        let top = scorer.score(
            &c,
            &RiskFactors {
                local_rank: Some(1),
                ..RiskFactors::default()
            },
        );
        assert!(approx(top.risk_score, 252.0));
        assert_eq!(top.risk_level, RiskLevel::High);
    }

    #[test]
    fn holiday_weight_applies() {
        let scorer = RiskScorer::for_dataset(DatasetType::Holiday);
        let c = counts(10, 12, 2, 3);
        // 40 + 36 + 40 + 24 = 140
        let base = scorer.score(&c, &RiskFactors::default());
        assert!(approx(base.risk_score, 140.0));
        assert_eq!(base.risk_level, RiskLevel::Medium);

        let chuseok = scorer.score(
            &c,
            &RiskFactors {
                holiday_period: Some(HolidayPeriodType::Chuseok),
                ..RiskFactors::default()
            },
        );
        assert!(approx(chuseok.risk_score, 280.0));
        assert_eq!(chuseok.risk_level, RiskLevel::High);
    }

    #[test]
    fn statistics_population_and_urban_weights() {
        let scorer = RiskScorer::for_dataset(DatasetType::AccidentStatistics);
        let c = counts(1_000, 1_400, 10, 0);
        // 1000 + 2100 + 80 = 3180
        let base = scorer.score(&c, &RiskFactors::default());
        assert!(approx(base.risk_score, 3180.0));
        assert_eq!(base.risk_level, RiskLevel::Medium);

        let metro = scorer.score(
            &c,
            &RiskFactors {
                population: Some(1_200_000),
                urban_level: Some(safewalk_accident_models::UrbanLevel::Urban),
                ..RiskFactors::default()
            },
        );
        assert!(approx(metro.risk_score, 6678.0));
        assert_eq!(metro.risk_level, RiskLevel::High);
    }

    #[test]
    fn link_thresholds() {
        let scorer = RiskScorer::for_dataset(DatasetType::LinkRiskArea);
        // 3×10 + 2.5×12 + 15×2 + 8×3 = 114
        let metrics = scorer.score(&counts(10, 12, 2, 3), &RiskFactors::default());
        assert!(approx(metrics.risk_score, 114.0));
        assert_eq!(metrics.risk_level, RiskLevel::Low);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let t = RiskProfile::for_dataset(DatasetType::Pedestrian).thresholds;
        assert_eq!(t.classify(100.0), RiskLevel::VeryHigh);
        assert_eq!(t.classify(99.99), RiskLevel::High);
        assert_eq!(t.classify(50.0), RiskLevel::High);
        assert_eq!(t.classify(20.0), RiskLevel::Medium);
        assert_eq!(t.classify(5.0), RiskLevel::Low);
        assert_eq!(t.classify(4.99), RiskLevel::VeryLow);
    }

    #[test]
    fn rounding_is_half_up() {
        assert!(approx(round2(41.666_666), 41.67));
        assert!(approx(round2(0.125), 0.13));
        assert!(approx(round2(f64::NAN), 0.0));
    }

    #[test]
    fn level_matches_stored_score() {
        let factors = RiskFactors {
            holiday_period: Some(HolidayPeriodType::SummerVacation),
            ..RiskFactors::default()
        };
        for dataset in DatasetType::all() {
            let scorer = RiskScorer::for_dataset(*dataset);
            for acc in [0, 1, 3, 7, 19, 250] {
                for cas in [0, 2, 9, 31] {
                    for deaths in [0, 1, 3] {
                        let metrics = scorer.score(&counts(acc, cas, deaths, 2), &factors);
                        assert_eq!(
                            metrics.risk_level,
                            scorer.profile().thresholds.classify(metrics.risk_score),
                            "{dataset} {acc}/{cas}/{deaths}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn just_below_threshold_rounds_up_into_level() {
        // 49.996 rounds to 50.00, which is High for pedestrians
        let t = RiskProfile::for_dataset(DatasetType::Pedestrian).thresholds;
        assert_eq!(t.classify(round2(49.996)), RiskLevel::High);
    }

    #[test]
    fn seasonal_levels() {
        assert_eq!(
            seasonal_risk(RiskLevel::VeryHigh, HolidayPeriodType::NewYear),
            SeasonalRiskLevel::PeakTourism
        );
        assert_eq!(
            seasonal_risk(RiskLevel::High, HolidayPeriodType::SummerVacation),
            SeasonalRiskLevel::HighTraffic
        );
        assert_eq!(
            seasonal_risk(RiskLevel::Medium, HolidayPeriodType::Chuseok),
            SeasonalRiskLevel::NormalHoliday
        );
        assert_eq!(
            seasonal_risk(RiskLevel::VeryLow, HolidayPeriodType::Unknown),
            SeasonalRiskLevel::MinimalRisk
        );
    }

    #[test]
    fn scoring_is_deterministic() {
        let scorer = RiskScorer::for_dataset(DatasetType::Holiday);
        let c = counts(7, 9, 1, 2);
        assert_eq!(
            scorer.score(&c, &RiskFactors::default()),
            scorer.score(&c, &RiskFactors::default())
        );
    }
}
