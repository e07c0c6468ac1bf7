#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Accident data source trait and the KoROAD implementation.
//!
//! The collector only ever talks to an [`AccidentSource`]: one call fetches
//! one page of raw records for one `(dataset, region, year)` query. The
//! [`koroad::KoroadClient`] is the production implementation; tests plug in
//! their own. Raw records are turned into persistable, risk-annotated
//! records by the [`mapper::RecordMapper`].

pub mod endpoints;
pub mod http;
pub mod koroad;
pub mod mapper;
pub mod progress;

use async_trait::async_trait;
use safewalk_accident_models::DatasetType;
use safewalk_source_models::{CriteriaError, FetchOutcome, ResultCode, SearchCriteria};

/// Errors that can occur while fetching from a data source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Request URL (without query string).
        url: String,
    },

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API answered with an error result code.
    #[error("API error {code} ({}): {message}", code.description())]
    Api {
        /// The `resultCode` returned.
        code: ResultCode,
        /// The `resultMsg` returned.
        message: String,
    },

    /// The query was rejected before sending.
    #[error("Invalid search criteria: {0}")]
    Criteria(#[from] CriteriaError),

    /// Source configuration is missing or malformed.
    #[error("Source configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// A provider of raw accident records.
///
/// Implementations perform exactly one attempt per call. "No data" is a
/// successful [`FetchOutcome::NoData`], never an error.
#[async_trait]
pub trait AccidentSource: Send + Sync {
    /// Fetches one page of records for `dataset`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the source is unreachable, answers with an
    /// error code, or returns an undecodable body.
    async fn fetch(
        &self,
        dataset: DatasetType,
        criteria: &SearchCriteria,
    ) -> Result<FetchOutcome, SourceError>;
}
