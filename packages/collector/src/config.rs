//! Collector configuration.
//!
//! Values come from three layers, later ones winning: built-in defaults, an
//! optional TOML file, then environment variables. CLI flags are applied on
//! top by the binary.
//!
//! ```toml
//! auth_key = "..."
//! max_requests_per_second = 5
//! years = ["2022", "2023"]
//! datasets = ["PEDESTRIAN", "HOLIDAY"]
//! regions = ["11-680", "26-440"]
//!
//! [factors.HOLIDAY]
//! holidayPeriod = "CHUSEOK"
//!
//! [factors.LOCAL_GOVERNMENT]
//! localRank = 1
//! localTotalSpots = 42
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use safewalk_accident_models::{DatasetType, RegionCode, RiskFactors, regions};
use safewalk_source::koroad::{
    ClientSettings, DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT,
    DEFAULT_USER_AGENT,
};
use safewalk_source_models::MAX_PAGE_SIZE;
use serde::{Deserialize, Serialize};

use crate::{CollectorError, plan::CollectionPlan, rate_limit::RateLimiter};

pub const ENV_API_KEY: &str = "KOROAD_API_KEY";
pub const ENV_DATASETS: &str = "SAFEWALK_DATASETS";
pub const ENV_MAX_RPS: &str = "SAFEWALK_MAX_RPS";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectorConfig {
    pub base_url: String,
    /// Falls back to `KOROAD_API_KEY` when absent.
    pub auth_key: Option<String>,
    pub max_requests_per_second: u32,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub user_agent: String,
    /// `numOfRows` requested by each collection task.
    pub page_size: u32,
    pub max_page_size: u32,
    pub years: Vec<String>,
    pub datasets: Vec<DatasetType>,
    /// `"11-680"` style ids. Empty selects every known region.
    pub regions: Vec<String>,
    pub db_path: Option<PathBuf>,
    /// Upper bound on a whole run.
    pub timeout_secs: Option<u64>,
    pub factors: BTreeMap<DatasetType, RiskFactors>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_key: None,
            max_requests_per_second: 10,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            read_timeout_secs: DEFAULT_READ_TIMEOUT.as_secs(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_size: MAX_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            years: (2017..=2023).map(|y: u16| y.to_string()).collect(),
            datasets: DatasetType::all().to_vec(),
            regions: Vec::new(),
            db_path: None,
            timeout_secs: None,
            factors: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for CollectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorConfig")
            .field("base_url", &self.base_url)
            .field("auth_key", &self.auth_key.as_ref().map(|_| "<redacted>"))
            .field("max_requests_per_second", &self.max_requests_per_second)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("page_size", &self.page_size)
            .field("max_page_size", &self.max_page_size)
            .field("years", &self.years)
            .field("datasets", &self.datasets)
            .field("regions", &self.regions)
            .field("db_path", &self.db_path)
            .field("timeout_secs", &self.timeout_secs)
            .field("factors", &self.factors)
            .finish()
    }
}

impl CollectorConfig {
    /// Reads `path`, or returns the defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read
    /// * If it is not valid TOML for this struct
    pub fn load(path: Option<&Path>) -> Result<Self, CollectorError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        log::debug!("Loading collector config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Applies the process environment. See [`Self::apply_overrides`].
    ///
    /// # Errors
    ///
    /// * If an override value cannot be parsed
    pub fn apply_env(&mut self) -> Result<(), CollectorError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Applies `KOROAD_API_KEY` (only when no key is configured),
    /// `SAFEWALK_DATASETS` and `SAFEWALK_MAX_RPS` as returned by `lookup`.
    ///
    /// # Errors
    ///
    /// * If `SAFEWALK_DATASETS` names an unknown dataset
    /// * If `SAFEWALK_MAX_RPS` is not an integer
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), CollectorError> {
        if self.auth_key.as_deref().is_none_or(str::is_empty) {
            if let Some(key) = lookup(ENV_API_KEY).filter(|k| !k.trim().is_empty()) {
                self.auth_key = Some(key.trim().to_string());
            }
        }

        if let Some(list) = lookup(ENV_DATASETS) {
            self.datasets = parse_datasets(&list)?;
        }

        if let Some(rps) = lookup(ENV_MAX_RPS) {
            self.max_requests_per_second = rps.trim().parse().map_err(|_| {
                CollectorError::config(format!("{ENV_MAX_RPS} must be an integer, got '{rps}'"))
            })?;
        }

        Ok(())
    }

    /// Checks every value the run depends on, except the API key which is
    /// only needed by [`Self::client_settings`].
    ///
    /// # Errors
    ///
    /// * If any value is out of range
    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.max_requests_per_second == 0 {
            return Err(CollectorError::config(
                "max_requests_per_second must be at least 1",
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.max_page_size) {
            return Err(CollectorError::config(format!(
                "max_page_size must be within 1..={MAX_PAGE_SIZE}, got {}",
                self.max_page_size
            )));
        }
        if !(1..=self.max_page_size).contains(&self.page_size) {
            return Err(CollectorError::config(format!(
                "page_size must be within 1..={}, got {}",
                self.max_page_size, self.page_size
            )));
        }
        if let Some(year) = self
            .years
            .iter()
            .find(|y| y.len() != 4 || !y.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(CollectorError::config(format!(
                "year must be four digits, got '{year}'"
            )));
        }
        if self.datasets.is_empty() {
            return Err(CollectorError::config("no datasets selected"));
        }
        if self.timeout_secs == Some(0) {
            return Err(CollectorError::config("timeout_secs must be positive"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(CollectorError::config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        self.resolve_regions()?;
        Ok(())
    }

    /// Regions named by [`Self::regions`], or the full table when empty.
    ///
    /// # Errors
    ///
    /// * If an id is not in the region table
    pub fn resolve_regions(&self) -> Result<Vec<RegionCode>, CollectorError> {
        if self.regions.is_empty() {
            return Ok(regions::all_regions());
        }
        self.regions
            .iter()
            .map(|id| {
                regions::parse_region_id(id)
                    .ok_or_else(|| CollectorError::config(format!("unknown region '{id}'")))
            })
            .collect()
    }

    /// HTTP client settings.
    ///
    /// # Errors
    ///
    /// * If no API key is configured
    pub fn client_settings(&self) -> Result<ClientSettings, CollectorError> {
        let auth_key = self
            .auth_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                CollectorError::config(format!(
                    "no API key: set auth_key in the config file or {ENV_API_KEY}"
                ))
            })?;

        Ok(ClientSettings {
            base_url: self.base_url.clone(),
            auth_key: auth_key.to_string(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            user_agent: self.user_agent.clone(),
        })
    }

    /// # Errors
    ///
    /// * If `max_requests_per_second` is zero
    pub fn rate_limiter(&self) -> Result<RateLimiter, CollectorError> {
        NonZeroU32::new(self.max_requests_per_second)
            .map(RateLimiter::per_second)
            .ok_or_else(|| CollectorError::config("max_requests_per_second must be at least 1"))
    }

    /// # Errors
    ///
    /// * If a region id is unknown
    pub fn plan(&self) -> Result<CollectionPlan, CollectorError> {
        Ok(CollectionPlan {
            regions: self.resolve_regions()?,
            years: self.years.clone(),
            page_size: self.page_size,
        })
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Parses a comma-separated dataset list such as `"pedestrian,link-risk-area"`.
///
/// # Errors
///
/// * If an entry is not a dataset type
pub fn parse_datasets(list: &str) -> Result<Vec<DatasetType>, CollectorError> {
    let mut datasets = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let normalized = item.to_ascii_uppercase().replace('-', "_");
        let dataset = normalized
            .parse::<DatasetType>()
            .map_err(|_| CollectorError::config(format!("unknown dataset '{item}'")))?;
        if !datasets.contains(&dataset) {
            datasets.push(dataset);
        }
    }
    Ok(datasets)
}

/// Splits a comma-separated list, dropping blanks.
#[must_use]
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
