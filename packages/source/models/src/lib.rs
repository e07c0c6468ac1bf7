#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Request and response types for the KoROAD open data API.
//!
//! Every endpoint takes the same [`SearchCriteria`] and answers with the
//! same [`ApiEnvelope`], parameterized over the item type. The
//! [`FetchOutcome`] is what a source hands back to the collector once the
//! envelope has been checked.

use std::str::FromStr;

use safewalk_accident_models::{RawAccidentRecord, RegionCode};
use serde::{Deserialize, Deserializer};
use strum_macros::{AsRefStr, Display, EnumString};

/// Default `numOfRows` when none is requested.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest `numOfRows` the API accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Query parameters for one page of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Four-digit search year (`searchYearCd`).
    pub year: String,
    /// Two-digit province code (`siDo`).
    pub province_code: String,
    /// Three-digit district code (`guGun`).
    pub district_code: String,
    /// Rows per page (`numOfRows`), 1-1000.
    pub page_size: u32,
    /// One-based page number (`pageNo`).
    pub page_no: u32,
}

/// Why a [`SearchCriteria`] was rejected before sending.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CriteriaError {
    #[error("year must be 4 digits, got {0:?}")]
    Year(String),
    #[error("province code must be 2 digits, got {0:?}")]
    Province(String),
    #[error("district code must be 3 digits, got {0:?}")]
    District(String),
    #[error("page size must be 1-{MAX_PAGE_SIZE}, got {0}")]
    PageSize(u32),
    #[error("page number must be at least 1")]
    PageNo,
}

impl SearchCriteria {
    /// First page for `region` in `year`, with the default page size.
    #[must_use]
    pub fn new(region: &RegionCode, year: &str) -> Self {
        Self {
            year: year.to_string(),
            province_code: region.province_code.clone(),
            district_code: region.district_code.clone(),
            page_size: DEFAULT_PAGE_SIZE,
            page_no: 1,
        }
    }

    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn next_page(&self) -> Self {
        Self {
            page_no: self.page_no + 1,
            ..self.clone()
        }
    }

    /// Checks the shape constraints the API enforces.
    ///
    /// # Errors
    ///
    /// Returns the first [`CriteriaError`] found.
    pub fn validate(&self) -> Result<(), CriteriaError> {
        if !is_digits(&self.year, 4) {
            return Err(CriteriaError::Year(self.year.clone()));
        }
        if !is_digits(&self.province_code, 2) {
            return Err(CriteriaError::Province(self.province_code.clone()));
        }
        if !is_digits(&self.district_code, 3) {
            return Err(CriteriaError::District(self.district_code.clone()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(CriteriaError::PageSize(self.page_size));
        }
        if self.page_no == 0 {
            return Err(CriteriaError::PageNo);
        }
        Ok(())
    }

    /// Query string pairs, including the API key and `type=json`.
    #[must_use]
    pub fn query_params(&self, auth_key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("authKey", auth_key.to_string()),
            ("searchYearCd", self.year.clone()),
            ("siDo", self.province_code.clone()),
            ("guGun", self.district_code.clone()),
            ("type", "json".to_string()),
            ("numOfRows", self.page_size.to_string()),
            ("pageNo", self.page_no.to_string()),
        ]
    }
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

/// `resultCode` values documented by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum ResultCode {
    #[strum(serialize = "00")]
    Success,
    #[strum(serialize = "03")]
    NoData,
    #[strum(serialize = "10")]
    InvalidParameters,
    #[strum(serialize = "99")]
    Unknown,
}

impl ResultCode {
    /// Parses a raw code. Unrecognized codes map to [`ResultCode::Unknown`].
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        Self::from_str(code.trim()).unwrap_or(Self::Unknown)
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NoData => "no data",
            Self::InvalidParameters => "invalid parameters",
            Self::Unknown => "unknown error",
        }
    }
}

/// Response envelope shared by all endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub result_code: Option<String>,
    #[serde(default)]
    pub result_msg: Option<String>,
    #[serde(default = "Vec::new", deserialize_with = "deserialize_items")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub num_of_rows: Option<u64>,
    #[serde(default)]
    pub page_no: Option<u64>,
}

impl<T> ApiEnvelope<T> {
    /// The parsed result code; a missing code counts as unknown.
    #[must_use]
    pub fn code(&self) -> ResultCode {
        self.result_code
            .as_deref()
            .map_or(ResultCode::Unknown, ResultCode::from_code)
    }

    /// Whether more pages follow this one.
    #[must_use]
    pub fn has_next_page(&self) -> bool {
        match (self.total_count, self.num_of_rows, self.page_no) {
            (Some(total), Some(rows), Some(page)) => page * rows < total,
            _ => false,
        }
    }

    #[must_use]
    pub fn total_pages(&self) -> u64 {
        match (self.total_count, self.num_of_rows) {
            (Some(total), Some(rows)) if rows > 0 => total.div_ceil(rows).max(1),
            _ => 1,
        }
    }
}

/// `items` arrives either as a bare array or wrapped as
/// `{"item": [...]}` / `{"item": {...}}`; an empty string also appears on
/// no-data responses.
fn deserialize_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Inner<T> {
        Many(Vec<T>),
        One(T),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Items<T> {
        List(Vec<T>),
        Wrapped { item: Option<Inner<T>> },
        Blank(String),
    }

    Ok(match Option::<Items<T>>::deserialize(deserializer)? {
        Some(Items::List(items) | Items::Wrapped { item: Some(Inner::Many(items)) }) => items,
        Some(Items::Wrapped { item: Some(Inner::One(item)) }) => vec![item],
        Some(Items::Blank(text)) if !text.trim().is_empty() => {
            return Err(serde::de::Error::custom(format!(
                "unexpected items value {text:?}"
            )));
        }
        Some(Items::Wrapped { item: None } | Items::Blank(_)) | None => Vec::new(),
    })
}

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The API returned at least one item.
    Records(Vec<RawAccidentRecord>),
    /// The API explicitly reported no data for the query.
    NoData,
}

impl FetchOutcome {
    /// Records in this outcome (empty for [`FetchOutcome::NoData`]).
    #[must_use]
    pub fn into_records(self) -> Vec<RawAccidentRecord> {
        match self {
            Self::Records(records) => records,
            Self::NoData => Vec::new(),
        }
    }

    /// Wraps `records`, collapsing an empty list into
    /// [`FetchOutcome::NoData`].
    #[must_use]
    pub fn from_records(records: Vec<RawAccidentRecord>) -> Self {
        if records.is_empty() {
            Self::NoData
        } else {
            Self::Records(records)
        }
    }
}
