#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Accident data collection pipeline.
//!
//! The [`orchestrator::CollectionOrchestrator`] runs one
//! [`dataset::DatasetCollector`] per dataset type concurrently. Each
//! collector walks its region × year task matrix in order, skipping tasks
//! that are already stored, pacing every API call through a shared
//! [`rate_limit::RateLimiter`], and persisting risk-scored records. Failures
//! are counted per task or per record and never stop sibling work.

pub mod config;
pub mod dataset;
pub mod orchestrator;
pub mod plan;
pub mod rate_limit;

#[cfg(test)]
mod testing;

use safewalk_database::DbError;
use safewalk_source::SourceError;

/// Errors that prevent a collection run from being set up.
///
/// Once collectors are running, failures are counted in their stats
/// instead of being returned.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// Config file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for [`config::CollectorConfig`].
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Source(#[from] SourceError),

    /// A collector task panicked or was cancelled.
    #[error("Collector task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The collector was asked to stop before its plan was done.
    #[error("{reason}")]
    Cancelled {
        /// Why the run was stopped.
        reason: String,
    },
}

impl CollectorError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
