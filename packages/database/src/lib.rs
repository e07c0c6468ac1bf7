#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Storage for collected accident records.
//!
//! The collector depends on two narrow ports: a [`DuplicateChecker`] that
//! answers "has this `(dataset, region, year)` task already been stored?",
//! and a [`PersistenceSink`] that saves one record at a time. Both are
//! implemented by the `DuckDB`-backed [`store::AccidentStore`], whose
//! primary key on the natural key is what actually prevents duplicate rows.

pub mod paths;
pub mod store;

use async_trait::async_trait;
use safewalk_accident_models::{AccidentRecord, DatasetType, RegionCode};

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Filesystem error (creating the data directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON column (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A writer panicked while holding the connection.
    #[error("Database connection lock poisoned")]
    Poisoned,

    /// A blocking database task panicked or was cancelled.
    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Result of saving one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new row was written.
    Saved,
    /// A row with the same natural key already existed; nothing was written.
    Duplicate,
}

/// Answers whether a collection task's records are already stored.
#[async_trait]
pub trait DuplicateChecker: Send + Sync {
    /// Whether any record of `dataset` exists for `region` in `year`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the existence query fails.
    async fn is_collected(
        &self,
        dataset: DatasetType,
        region: &RegionCode,
        year: &str,
    ) -> Result<bool, DbError>;
}

/// Persists mapped records.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Saves `record`. A natural-key conflict is reported as
    /// [`SaveOutcome::Duplicate`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] for any failure other than a key conflict.
    async fn save(&self, record: &AccidentRecord) -> Result<SaveOutcome, DbError>;
}
