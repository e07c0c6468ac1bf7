//! Province/district reference data used as the collection region matrix.
//!
//! Province (시도) codes are two digits and district (시군구) codes are
//! three digits, matching the `siDo` / `guGun` query parameters of the
//! KoROAD API.

use serde::{Deserialize, Serialize};

/// Districts walked by the collector: `(province code, district code,
/// district name)`.
pub const DISTRICTS: &[(&str, &str, &str)] = &[
    ("11", "680", "강남구"),
    ("11", "740", "강동구"),
    ("11", "305", "강북구"),
    ("26", "440", "강서구"),
    ("26", "410", "금정구"),
    ("27", "200", "남구"),
    ("27", "290", "달서구"),
    ("28", "185", "연수구"),
    ("28", "245", "계양구"),
    ("29", "155", "남구"),
    ("29", "170", "북구"),
    ("30", "230", "대덕구"),
    ("30", "200", "유성구"),
    ("31", "200", "북구"),
    ("31", "140", "남구"),
    ("36", "110", "세종시"),
    ("41", "820", "가평군"),
    ("41", "280", "고양시"),
    ("42", "150", "강릉시"),
    ("42", "820", "고성군"),
    ("43", "720", "보은군"),
    ("43", "740", "영동군"),
    ("44", "250", "계룡시"),
    ("44", "710", "금산군"),
    ("45", "130", "군산시"),
    ("45", "180", "정읍시"),
    ("46", "910", "신안군"),
    ("46", "230", "광양시"),
    ("47", "290", "경산시"),
    ("47", "130", "경주시"),
    ("48", "170", "진주시"),
    ("48", "120", "창원시"),
    ("50", "110", "제주시"),
    ("50", "130", "서귀포시"),
];

/// A (province, district) administrative pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionCode {
    /// Two-digit province code (`siDo`).
    pub province_code: String,
    /// Three-digit district code (`guGun`).
    pub district_code: String,
    /// Province name.
    pub province_name: String,
    /// District name.
    pub district_name: String,
}

impl RegionCode {
    /// Builds a region from its codes, resolving the province name from the
    /// reference table.
    #[must_use]
    pub fn new(province_code: &str, district_code: &str, district_name: &str) -> Self {
        Self {
            province_code: province_code.to_string(),
            district_code: district_code.to_string(),
            province_name: province_name(province_code).to_string(),
            district_name: district_name.to_string(),
        }
    }

    /// Returns the `"11-680"` style identifier.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}-{}", self.province_code, self.district_code)
    }
}

impl std::fmt::Display for RegionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({}-{})",
            self.province_name, self.district_name, self.province_code, self.district_code
        )
    }
}

/// Maps a two-digit province code to its name.
///
/// Returns `"미상"` for unrecognized codes.
#[must_use]
pub fn province_name(code: &str) -> &'static str {
    match code {
        "11" => "서울특별시",
        "26" => "부산광역시",
        "27" => "대구광역시",
        "28" => "인천광역시",
        "29" => "광주광역시",
        "30" => "대전광역시",
        "31" => "울산광역시",
        "36" => "세종특별자치시",
        "41" => "경기도",
        "42" => "강원특별자치도",
        "43" => "충청북도",
        "44" => "충청남도",
        "45" => "전북특별자치도",
        "46" => "전라남도",
        "47" => "경상북도",
        "48" => "경상남도",
        "50" => "제주특별자치도",
        _ => "미상",
    }
}

/// Returns every region in the reference table, in collection order.
#[must_use]
pub fn all_regions() -> Vec<RegionCode> {
    DISTRICTS
        .iter()
        .map(|(province, district, name)| RegionCode::new(province, district, name))
        .collect()
}

/// Looks up a region by its codes.
#[must_use]
pub fn find_region(province_code: &str, district_code: &str) -> Option<RegionCode> {
    DISTRICTS
        .iter()
        .find(|(p, d, _)| *p == province_code && *d == district_code)
        .map(|(p, d, name)| RegionCode::new(p, d, name))
}

/// Parses an `"11-680"` style identifier against the reference table.
#[must_use]
pub fn parse_region_id(id: &str) -> Option<RegionCode> {
    let (province, district) = id.trim().split_once('-')?;
    find_region(province, district)
}
