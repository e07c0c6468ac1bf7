//! HTTP client for the KoROAD open data REST API.
//!
//! All six datasets share one query shape and one response envelope; only
//! the endpoint path and the item payload differ. One [`KoroadClient::fetch`]
//! call is one HTTP request for one page.

use std::{collections::BTreeMap, fmt, time::Duration};

use async_trait::async_trait;
use safewalk_accident_models::{
    DatasetType, HotspotItem, RawAccidentRecord, RecordShape, RiskAreaItem, StatisticsItem,
};
use safewalk_source_models::{ApiEnvelope, FetchOutcome, ResultCode, SearchCriteria};
use serde::de::DeserializeOwned;

use crate::{
    AccidentSource, SourceError,
    endpoints::{EndpointDefinition, all_endpoints},
    http::send_json,
};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://opendata.koroad.or.kr/data/rest";

/// `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Tourism-Safety-Service/1.0";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`KoroadClient`].
#[derive(Clone)]
pub struct ClientSettings {
    pub base_url: String,
    /// Issued API key, sent as `authKey`.
    pub auth_key: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub user_agent: String,
}

impl ClientSettings {
    /// Production settings for `auth_key`.
    #[must_use]
    pub fn new(auth_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_key: auth_key.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("base_url", &self.base_url)
            .field("auth_key", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// [`AccidentSource`] backed by the live KoROAD API.
#[derive(Debug)]
pub struct KoroadClient {
    http: reqwest::Client,
    settings: ClientSettings,
    endpoints: BTreeMap<DatasetType, EndpointDefinition>,
}

impl KoroadClient {
    /// Builds a client and loads the endpoint registry.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the API key is empty or the
    /// registry is malformed, and [`SourceError::Http`] if the HTTP client
    /// cannot be constructed.
    pub fn new(settings: ClientSettings) -> Result<Self, SourceError> {
        if settings.auth_key.trim().is_empty() {
            return Err(SourceError::Config {
                message: "KoROAD API key is empty".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .user_agent(settings.user_agent.clone())
            .build()?;

        let endpoints = all_endpoints()?
            .into_iter()
            .map(|e| (e.dataset, e))
            .collect();

        Ok(Self {
            http,
            settings,
            endpoints,
        })
    }

    #[must_use]
    pub const fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn endpoint(&self, dataset: DatasetType) -> Result<&EndpointDefinition, SourceError> {
        self.endpoints
            .get(&dataset)
            .ok_or_else(|| SourceError::Config {
                message: format!("no endpoint configured for {dataset}"),
            })
    }
}

#[async_trait]
impl AccidentSource for KoroadClient {
    async fn fetch(
        &self,
        dataset: DatasetType,
        criteria: &SearchCriteria,
    ) -> Result<FetchOutcome, SourceError> {
        criteria.validate()?;

        let url = self.endpoint(dataset)?.url(&self.settings.base_url);
        log::debug!(
            "{dataset}: GET {url} year={} region={}-{} page={}",
            criteria.year,
            criteria.province_code,
            criteria.district_code,
            criteria.page_no,
        );

        let body = send_json(
            self.http
                .get(&url)
                .query(&criteria.query_params(&self.settings.auth_key)),
        )
        .await?;

        let page = parse_response(dataset, body)?;
        if page.has_more {
            log::warn!(
                "{dataset}: {}-{}/{} has {} rows but only page {} of {} was fetched",
                criteria.province_code,
                criteria.district_code,
                criteria.year,
                page.total_count.unwrap_or_default(),
                criteria.page_no,
                page.total_pages,
            );
        }
        Ok(page.outcome)
    }
}

/// A decoded response page.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePage {
    pub outcome: FetchOutcome,
    pub total_count: Option<u64>,
    pub total_pages: u64,
    /// Whether the API reported rows beyond this page.
    pub has_more: bool,
}

/// Decodes a response body for `dataset` into a [`ResponsePage`].
///
/// # Errors
///
/// Returns [`SourceError::Json`] if the envelope or items do not decode, and
/// [`SourceError::Api`] for any result code other than success or no-data.
pub fn parse_response(
    dataset: DatasetType,
    body: serde_json::Value,
) -> Result<ResponsePage, SourceError> {
    match dataset.shape() {
        RecordShape::Hotspot => decode::<HotspotItem>(body, RawAccidentRecord::Hotspot),
        RecordShape::Statistics => decode::<StatisticsItem>(body, RawAccidentRecord::Statistics),
        RecordShape::RiskArea => decode::<RiskAreaItem>(body, RawAccidentRecord::RiskArea),
    }
}

fn decode<T: DeserializeOwned>(
    body: serde_json::Value,
    wrap: fn(T) -> RawAccidentRecord,
) -> Result<ResponsePage, SourceError> {
    let envelope: ApiEnvelope<T> = serde_json::from_value(body)?;
    let has_more = envelope.has_next_page();
    let total_pages = envelope.total_pages();
    let total_count = envelope.total_count;

    let outcome = match envelope.code() {
        ResultCode::Success => {
            FetchOutcome::from_records(envelope.items.into_iter().map(wrap).collect())
        }
        ResultCode::NoData => FetchOutcome::NoData,
        code @ (ResultCode::InvalidParameters | ResultCode::Unknown) => {
            return Err(SourceError::Api {
                code,
                message: envelope.result_msg.unwrap_or_default(),
            });
        }
    };

    Ok(ResponsePage {
        outcome,
        total_count,
        total_pages,
        has_more,
    })
}
