#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Statistics produced by a collection run.
//!
//! Each dataset collector owns exactly one [`CollectionStats`] for the
//! duration of its run. Once every collector has finished, the orchestrator
//! folds them into a single [`DataCollectionResult`].

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use safewalk_accident_models::DatasetType;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

/// Lifecycle of a single dataset collector.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectorState {
    #[default]
    Init,
    Running,
    Completed,
    Failed,
}

/// Counters for one dataset type's run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub dataset_type: DatasetType,
    pub state: CollectorState,
    /// Records newly persisted.
    pub collected: u64,
    /// Tasks skipped as already collected, plus records rejected by the
    /// natural-key constraint.
    pub duplicate: u64,
    /// Failed fetches, unmappable records, and failed saves.
    pub error: u64,
    /// `(region, year)` tasks planned.
    pub tasks_total: u64,
    /// Tasks attempted so far.
    pub tasks_processed: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl CollectionStats {
    /// Fresh stats in the [`CollectorState::Init`] state.
    #[must_use]
    pub const fn new(dataset_type: DatasetType) -> Self {
        Self {
            dataset_type,
            state: CollectorState::Init,
            collected: 0,
            duplicate: 0,
            error: 0,
            tasks_total: 0,
            tasks_processed: 0,
            started_at: None,
            finished_at: None,
            success: false,
            error_message: None,
        }
    }

    /// Moves to [`CollectorState::Running`] with `tasks_total` planned tasks.
    pub const fn start(&mut self, at: DateTime<Utc>, tasks_total: u64) {
        self.state = CollectorState::Running;
        self.started_at = Some(at);
        self.tasks_total = tasks_total;
    }

    pub const fn record_collected(&mut self) {
        self.collected += 1;
    }

    pub const fn record_duplicate(&mut self) {
        self.duplicate += 1;
    }

    pub const fn record_error(&mut self) {
        self.error += 1;
    }

    pub const fn record_task(&mut self) {
        self.tasks_processed += 1;
    }

    /// Marks the run as completed successfully.
    pub const fn finish(&mut self, at: DateTime<Utc>) {
        self.state = CollectorState::Completed;
        self.finished_at = Some(at);
        self.success = true;
    }

    /// Marks the run as failed. Counters gathered so far are kept.
    pub fn fail(&mut self, at: DateTime<Utc>, message: impl Into<String>) {
        if self.started_at.is_none() {
            self.started_at = Some(at);
        }
        self.state = CollectorState::Failed;
        self.finished_at = Some(at);
        self.success = false;
        self.error_message = Some(message.into());
    }

    /// Records processed in any way (`collected + duplicate + error`).
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.collected + self.duplicate + self.error
    }

    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        Some(self.finished_at? - self.started_at?)
    }

    /// Whether the collector has reached a terminal state.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(
            self.state,
            CollectorState::Completed | CollectorState::Failed
        )
    }
}

/// Aggregate of every dataset collector's stats for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataCollectionResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub success: bool,
    /// One message per failed collector, in dataset order.
    pub errors: Vec<String>,
    pub datasets: BTreeMap<DatasetType, CollectionStats>,
    pub total_collected: u64,
    pub total_duplicate: u64,
    pub total_error: u64,
}

impl DataCollectionResult {
    #[must_use]
    pub const fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            success: true,
            errors: Vec::new(),
            datasets: BTreeMap::new(),
            total_collected: 0,
            total_duplicate: 0,
            total_error: 0,
        }
    }

    /// Adds one collector's finished stats.
    ///
    /// A failed collector turns the whole run unsuccessful but its partial
    /// counts still contribute to the totals. Adding the same dataset twice
    /// replaces the earlier entry.
    pub fn merge(&mut self, stats: CollectionStats) {
        if let Some(previous) = self.datasets.remove(&stats.dataset_type) {
            self.total_collected -= previous.collected;
            self.total_duplicate -= previous.duplicate;
            self.total_error -= previous.error;
        }

        self.total_collected += stats.collected;
        self.total_duplicate += stats.duplicate;
        self.total_error += stats.error;

        self.datasets.insert(stats.dataset_type, stats);
        self.refresh_status();
    }

    /// Records a collector that produced no stats at all (its task
    /// panicked or was cancelled).
    pub fn record_failure(&mut self, dataset: DatasetType, at: DateTime<Utc>, message: &str) {
        let mut stats = self
            .datasets
            .get(&dataset)
            .cloned()
            .unwrap_or_else(|| CollectionStats::new(dataset));
        stats.fail(at, message);
        self.merge(stats);
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
        self.refresh_status();
    }

    fn refresh_status(&mut self) {
        self.errors = self
            .datasets
            .values()
            .filter(|s| !s.success)
            .map(|s| {
                format!(
                    "{}: {}",
                    s.dataset_type,
                    s.error_message.as_deref().unwrap_or("did not complete")
                )
            })
            .collect();
        self.success = self.errors.is_empty();
    }

    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        (!self.errors.is_empty()).then(|| self.errors.join("; "))
    }

    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        Some(self.finished_at? - self.started_at)
    }

    #[must_use]
    pub fn get(&self, dataset: DatasetType) -> Option<&CollectionStats> {
        self.datasets.get(&dataset)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn t(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, secs).unwrap()
    }

    fn finished(dataset: DatasetType, collected: u64, duplicate: u64, error: u64) -> CollectionStats {
        let mut stats = CollectionStats::new(dataset);
        stats.start(t(0), 10);
        for _ in 0..collected {
            stats.record_collected();
        }
        for _ in 0..duplicate {
            stats.record_duplicate();
        }
        for _ in 0..error {
            stats.record_error();
        }
        stats.finish(t(30));
        stats
    }

    #[test]
    fn stats_lifecycle() {
        let mut stats = CollectionStats::new(DatasetType::Holiday);
        assert_eq!(stats.state, CollectorState::Init);
        assert!(!stats.is_finished());

        stats.start(t(0), 14);
        assert_eq!(stats.state, CollectorState::Running);
        stats.record_collected();
        stats.record_duplicate();
        stats.record_error();
        stats.record_task();
        stats.finish(t(5));

        assert_eq!(stats.state, CollectorState::Completed);
        assert!(stats.success);
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.tasks_processed, 1);
        assert_eq!(stats.elapsed(), Some(Duration::seconds(5)));
    }

    #[test]
    fn failed_stats_keep_counters() {
        let mut stats = CollectionStats::new(DatasetType::Pedestrian);
        stats.start(t(0), 3);
        stats.record_collected();
        stats.fail(t(2), "database unavailable");

        assert_eq!(stats.state, CollectorState::Failed);
        assert!(!stats.success);
        assert_eq!(stats.collected, 1);
        assert_eq!(stats.error_message.as_deref(), Some("database unavailable"));
    }

    #[test]
    fn merge_sums_totals() {
        let mut result = DataCollectionResult::new(t(0));
        result.merge(finished(DatasetType::Pedestrian, 5, 2, 1));
        result.merge(finished(DatasetType::Holiday, 3, 0, 4));
        result.finish(t(40));

        assert!(result.success);
        assert_eq!(result.total_collected, 8);
        assert_eq!(result.total_duplicate, 2);
        assert_eq!(result.total_error, 5);
        assert_eq!(result.error_message(), None);
        assert_eq!(result.elapsed(), Some(Duration::seconds(40)));
    }

    #[test]
    fn one_failure_fails_the_run_but_keeps_partials() {
        let mut result = DataCollectionResult::new(t(0));
        result.merge(finished(DatasetType::Pedestrian, 5, 0, 0));

        let mut broken = CollectionStats::new(DatasetType::LinkRiskArea);
        broken.start(t(0), 10);
        broken.record_collected();
        broken.fail(t(1), "connection refused");
        result.merge(broken);

        result.record_failure(DatasetType::Holiday, t(2), "task panicked");
        result.finish(t(3));

        assert!(!result.success);
        assert_eq!(result.total_collected, 6);
        assert_eq!(result.errors.len(), 2);
        let message = result.error_message().unwrap();
        assert!(message.contains("LINK_RISK_AREA: connection refused"));
        assert!(message.contains("HOLIDAY: task panicked"));
        assert_eq!(
            result.get(DatasetType::Holiday).map(|s| s.state),
            Some(CollectorState::Failed)
        );
    }

    #[test]
    fn merging_same_dataset_replaces() {
        let mut result = DataCollectionResult::new(t(0));
        result.merge(finished(DatasetType::Pedestrian, 5, 0, 0));
        result.merge(finished(DatasetType::Pedestrian, 2, 1, 0));
        assert_eq!(result.total_collected, 2);
        assert_eq!(result.total_duplicate, 1);
        assert_eq!(result.datasets.len(), 1);
    }

    #[test]
    fn serializes_camel_case() {
        let mut result = DataCollectionResult::new(t(0));
        result.merge(finished(DatasetType::Pedestrian, 1, 0, 0));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["totalCollected"], 1);
        assert_eq!(json["datasets"]["PEDESTRIAN"]["state"], "COMPLETED");
    }
}
