//! Raw item payloads as returned by the KoROAD endpoints.
//!
//! The API is loose about types: counts and coordinates show up as JSON
//! numbers on some endpoints and as numeric strings on others, and any field
//! may be absent. Every field is therefore optional and deserialized
//! leniently.

use serde::{Deserialize, Serialize};

use crate::RecordShape;

/// Item returned by the four hotspot endpoints (pedestrian, elderly,
/// local-government, holiday).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HotspotItem {
    /// Hotspot feature id.
    #[serde(rename = "afos_fid", default, deserialize_with = "lenient::opt_i64")]
    pub feature_id: Option<i64>,
    /// Hotspot area id; the natural key for hotspot datasets.
    #[serde(rename = "afos_id", default, deserialize_with = "lenient::opt_string")]
    pub afos_id: Option<String>,
    /// Legal-dong code.
    #[serde(rename = "bjd_cd", default, deserialize_with = "lenient::opt_string")]
    pub legal_dong_code: Option<String>,
    /// Spot code.
    #[serde(rename = "spot_cd", default, deserialize_with = "lenient::opt_string")]
    pub spot_code: Option<String>,
    /// Province + district name.
    #[serde(rename = "sido_sgg_nm", default, deserialize_with = "lenient::opt_string")]
    pub region_name: Option<String>,
    /// Spot description.
    #[serde(rename = "spot_nm", default, deserialize_with = "lenient::opt_string")]
    pub spot_name: Option<String>,
    #[serde(rename = "occrrnc_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub accident_count: Option<i64>,
    #[serde(rename = "caslt_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub casualty_count: Option<i64>,
    #[serde(rename = "dth_dnv_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub death_count: Option<i64>,
    #[serde(rename = "se_dnv_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub serious_injury_count: Option<i64>,
    #[serde(rename = "sl_dnv_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub minor_injury_count: Option<i64>,
    #[serde(rename = "wnd_dnv_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub injury_report_count: Option<i64>,
    /// WGS84 longitude.
    #[serde(rename = "lo_crd", default, deserialize_with = "lenient::opt_f64")]
    pub longitude: Option<f64>,
    /// WGS84 latitude.
    #[serde(rename = "la_crd", default, deserialize_with = "lenient::opt_f64")]
    pub latitude: Option<f64>,
    /// Hotspot polygon as a `GeoJSON` string.
    #[serde(rename = "geom_json", default, deserialize_with = "lenient::opt_string")]
    pub geometry_json: Option<String>,
}

/// Item returned by the jurisdiction statistics endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatisticsItem {
    #[serde(rename = "std_year", default, deserialize_with = "lenient::opt_string")]
    pub standard_year: Option<String>,
    /// Accident classification (e.g. `"보행자사고"`).
    #[serde(rename = "acc_cl_nm", default, deserialize_with = "lenient::opt_string")]
    pub classification: Option<String>,
    #[serde(rename = "sido_sgg_nm", default, deserialize_with = "lenient::opt_string")]
    pub region_name: Option<String>,
    #[serde(rename = "acc_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub accident_count: Option<i64>,
    #[serde(rename = "acc_cnt_cmrt", default, deserialize_with = "lenient::opt_f64")]
    pub accident_count_ratio: Option<f64>,
    #[serde(rename = "dth_dnv_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub death_count: Option<i64>,
    #[serde(rename = "dth_dnv_cnt_cmrt", default, deserialize_with = "lenient::opt_f64")]
    pub death_count_ratio: Option<f64>,
    /// Fatality rate as published by the API.
    #[serde(rename = "ftlt_rate", default, deserialize_with = "lenient::opt_f64")]
    pub fatality_rate: Option<f64>,
    #[serde(rename = "injpsn_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub injured_count: Option<i64>,
    #[serde(rename = "injpsn_cnt_cmrt", default, deserialize_with = "lenient::opt_f64")]
    pub injured_count_ratio: Option<f64>,
    #[serde(rename = "tot_acc_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub total_accident_count: Option<i64>,
    #[serde(rename = "tot_dth_dnv_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub total_death_count: Option<i64>,
    #[serde(rename = "tot_injpsn_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub total_injured_count: Option<i64>,
    /// Accidents per 100k population.
    #[serde(rename = "pop_100k", default, deserialize_with = "lenient::opt_f64")]
    pub per_100k_population: Option<f64>,
    /// Accidents per 10k registered vehicles.
    #[serde(rename = "car_10k", default, deserialize_with = "lenient::opt_f64")]
    pub per_10k_vehicles: Option<f64>,
    #[serde(rename = "cnt_027_01", default, deserialize_with = "lenient::opt_i64")]
    pub speeding_count: Option<i64>,
    #[serde(rename = "cnt_027_02", default, deserialize_with = "lenient::opt_i64")]
    pub center_line_violation_count: Option<i64>,
    #[serde(rename = "cnt_027_03", default, deserialize_with = "lenient::opt_i64")]
    pub signal_violation_count: Option<i64>,
    #[serde(rename = "cnt_027_04", default, deserialize_with = "lenient::opt_i64")]
    pub safe_distance_violation_count: Option<i64>,
    #[serde(rename = "cnt_027_05", default, deserialize_with = "lenient::opt_i64")]
    pub unsafe_driving_count: Option<i64>,
    #[serde(rename = "cnt_027_06", default, deserialize_with = "lenient::opt_i64")]
    pub intersection_violation_count: Option<i64>,
    #[serde(rename = "cnt_027_07", default, deserialize_with = "lenient::opt_i64")]
    pub pedestrian_protection_violation_count: Option<i64>,
    #[serde(rename = "cnt_027_99", default, deserialize_with = "lenient::opt_i64")]
    pub other_violation_count: Option<i64>,
    #[serde(rename = "cnt_014_01", default, deserialize_with = "lenient::opt_i64")]
    pub vehicle_vs_pedestrian_count: Option<i64>,
    #[serde(rename = "cnt_014_02", default, deserialize_with = "lenient::opt_i64")]
    pub vehicle_vs_vehicle_count: Option<i64>,
    #[serde(rename = "cnt_014_03", default, deserialize_with = "lenient::opt_i64")]
    pub single_vehicle_count: Option<i64>,
    #[serde(rename = "cnt_014_04", default, deserialize_with = "lenient::opt_i64")]
    pub railway_crossing_count: Option<i64>,
}

/// Item returned by the link-based risk area endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RiskAreaItem {
    /// Risk area (link) name; the natural key for this dataset.
    #[serde(rename = "acc_risk_area_nm", default, deserialize_with = "lenient::opt_string")]
    pub area_name: Option<String>,
    #[serde(rename = "tot_acc_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub accident_count: Option<i64>,
    #[serde(rename = "tot_dth_dnv_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub death_count: Option<i64>,
    #[serde(rename = "tot_se_dnv_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub serious_injury_count: Option<i64>,
    #[serde(rename = "tot_sl_dnv_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub minor_injury_count: Option<i64>,
    #[serde(rename = "tot_wnd_dnv_cnt", default, deserialize_with = "lenient::opt_i64")]
    pub injury_report_count: Option<i64>,
    /// Bracketed, quoted cause list, e.g. `["기타","안전거리 미확보"]`.
    #[serde(rename = "cause_anals_ty_nm", default, deserialize_with = "lenient::opt_string")]
    pub cause_analysis: Option<String>,
    /// UTM-K easting of the area center.
    #[serde(rename = "cntpnt_utmk_x_crd", default, deserialize_with = "lenient::opt_f64")]
    pub center_utmk_x: Option<f64>,
    /// UTM-K northing of the area center.
    #[serde(rename = "cntpnt_utmk_y_crd", default, deserialize_with = "lenient::opt_f64")]
    pub center_utmk_y: Option<f64>,
    /// Area polygon as WKT.
    #[serde(rename = "geom_wkt", default, deserialize_with = "lenient::opt_string")]
    pub geometry_wkt: Option<String>,
}

/// Severity counts extracted from any raw record shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccidentCounts {
    pub accidents: Option<i64>,
    pub casualties: Option<i64>,
    pub deaths: Option<i64>,
    pub serious_injuries: Option<i64>,
    pub minor_injuries: Option<i64>,
    pub injury_reports: Option<i64>,
}

/// A raw record from any of the six endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAccidentRecord {
    Hotspot(HotspotItem),
    Statistics(StatisticsItem),
    RiskArea(RiskAreaItem),
}

impl RawAccidentRecord {
    #[must_use]
    pub const fn shape(&self) -> RecordShape {
        match self {
            Self::Hotspot(_) => RecordShape::Hotspot,
            Self::Statistics(_) => RecordShape::Statistics,
            Self::RiskArea(_) => RecordShape::RiskArea,
        }
    }

    /// Extracts the severity counts used for risk scoring.
    ///
    /// Statistics rows have no serious-injury breakdown, so only accidents,
    /// injured persons and deaths are populated. Risk areas have no
    /// casualty total; it is the sum of the four injury classes, and stays
    /// `None` only when all four are missing.
    #[must_use]
    pub fn counts(&self) -> AccidentCounts {
        match self {
            Self::Hotspot(item) => AccidentCounts {
                accidents: item.accident_count,
                casualties: item.casualty_count,
                deaths: item.death_count,
                serious_injuries: item.serious_injury_count,
                minor_injuries: item.minor_injury_count,
                injury_reports: item.injury_report_count,
            },
            Self::Statistics(item) => AccidentCounts {
                accidents: item.accident_count,
                casualties: item.injured_count,
                deaths: item.death_count,
                serious_injuries: None,
                minor_injuries: None,
                injury_reports: None,
            },
            Self::RiskArea(item) => {
                let parts = [
                    item.death_count,
                    item.serious_injury_count,
                    item.minor_injury_count,
                    item.injury_report_count,
                ];
                let casualties = if parts.iter().all(Option::is_none) {
                    None
                } else {
                    Some(parts.iter().map(|p| p.unwrap_or(0)).sum())
                };
                AccidentCounts {
                    accidents: item.accident_count,
                    casualties,
                    deaths: item.death_count,
                    serious_injuries: item.serious_injury_count,
                    minor_injuries: item.minor_injury_count,
                    injury_reports: item.injury_report_count,
                }
            }
        }
    }
}

/// Parses the risk-area cause list (`["기타","안전거리 미확보"]`) into its
/// entries. Empty or missing input yields an empty list.
#[must_use]
pub fn parse_cause_list(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    raw.replace(['[', ']', '"'], "")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Int(i64),
        Float(f64),
        Text(String),
        Bool(bool),
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Loose>::deserialize(deserializer)? {
            Some(Loose::Int(n)) => Some(n),
            Some(Loose::Float(f)) if f.is_finite() => Some(f.round() as i64),
            Some(Loose::Text(s)) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.round() as i64)
                })
            }
            _ => None,
        })
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Loose>::deserialize(deserializer)? {
            Some(Loose::Int(n)) => Some(n as f64),
            Some(Loose::Float(f)) => Some(f),
            Some(Loose::Text(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
    }

    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Loose>::deserialize(deserializer)? {
            Some(Loose::Text(s)) if !s.trim().is_empty() => Some(s),
            Some(Loose::Int(n)) => Some(n.to_string()),
            Some(Loose::Float(f)) => Some(f.to_string()),
            Some(Loose::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }
}
