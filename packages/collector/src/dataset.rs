//! Collection of a single dataset type.
//!
//! A [`DatasetCollector`] walks the plan's tasks strictly in order:
//!
//! 1. Skip the task if the duplicate checker says it is already stored.
//! 2. Wait for a rate-limiter slot and fetch one page from the source.
//! 3. Validate, map and save every returned record.
//!
//! Every per-task and per-record failure is counted and logged, then the
//! loop moves on. Only a source configuration error aborts the run, since
//! every remaining task would fail the same way.
//!
//! A collector can also be cancelled through a watch channel. Cancellation
//! is observed before each task and while waiting for a fetch, never in the
//! middle of saving a page, so every row written is also counted.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use safewalk_accident_models::DatasetType;
use safewalk_collector_models::CollectionStats;
use safewalk_database::{DuplicateChecker, PersistenceSink, SaveOutcome};
use safewalk_source::{
    AccidentSource, SourceError,
    mapper::RecordMapper,
    progress::{ProgressCallback, null_progress},
};
use safewalk_source_models::SearchCriteria;
use tokio::sync::watch;

use crate::{
    CollectorError,
    plan::{CollectionPlan, CollectionTask},
    rate_limit::RateLimiter,
};

/// Tasks between progress log lines.
pub const PROGRESS_LOG_INTERVAL: u64 = 100;

/// External collaborators shared by every dataset collector of a run.
#[derive(Clone)]
pub struct CollectorPorts {
    pub source: Arc<dyn AccidentSource>,
    pub checker: Arc<dyn DuplicateChecker>,
    pub sink: Arc<dyn PersistenceSink>,
    pub limiter: Arc<RateLimiter>,
}

pub struct DatasetCollector {
    mapper: RecordMapper,
    ports: CollectorPorts,
    plan: Arc<CollectionPlan>,
    progress: Arc<dyn ProgressCallback>,
    snapshots: Option<watch::Sender<CollectionStats>>,
    cancel: Option<watch::Receiver<Option<String>>>,
}

impl DatasetCollector {
    #[must_use]
    pub fn new(mapper: RecordMapper, ports: CollectorPorts, plan: Arc<CollectionPlan>) -> Self {
        Self {
            mapper,
            ports,
            plan,
            progress: null_progress(),
            snapshots: None,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Publishes a copy of the stats after every task and every record
    /// outcome, so an aborted run still leaves its latest counters behind.
    #[must_use]
    pub fn with_snapshots(mut self, snapshots: watch::Sender<CollectionStats>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Stops the run with the given reason once the channel holds `Some`.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: watch::Receiver<Option<String>>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub const fn dataset(&self) -> DatasetType {
        self.mapper.dataset()
    }

    /// Runs every task of the plan and returns the finalized stats.
    #[allow(clippy::cast_precision_loss)]
    pub async fn run(&self) -> CollectionStats {
        let dataset = self.dataset();
        let total = self.plan.len() as u64;
        let start = Instant::now();

        let mut stats = CollectionStats::new(dataset);
        stats.start(Utc::now(), total);
        self.publish(&stats);
        self.progress.set_total(total);

        log::info!(
            "{dataset}: collecting {total} tasks ({} regions x {} years)",
            self.plan.regions.len(),
            self.plan.years.len(),
        );

        for task in self.plan.tasks(dataset) {
            self.progress
                .set_message(format!("{dataset} {} {}", task.region.id(), task.year));

            let outcome = match self.cancellation() {
                Some(reason) => Err(CollectorError::Cancelled { reason }),
                None => self.run_task(&task, &mut stats).await,
            };
            if let Err(e) = outcome {
                log::error!(
                    "{dataset}: aborting after {}/{total} tasks: {e}",
                    stats.tasks_processed
                );
                stats.fail(Utc::now(), e.to_string());
                self.publish(&stats);
                self.progress.finish(format!("{dataset}: failed"));
                return stats;
            }

            stats.record_task();
            self.publish(&stats);
            self.progress.inc(1);

            if stats.tasks_processed % PROGRESS_LOG_INTERVAL == 0 {
                log::info!(
                    "{dataset}: {}/{total} tasks ({:.1}%) collected={} duplicate={} error={}",
                    stats.tasks_processed,
                    stats.tasks_processed as f64 / total.max(1) as f64 * 100.0,
                    stats.collected,
                    stats.duplicate,
                    stats.error,
                );
            }
        }

        stats.finish(Utc::now());
        self.publish(&stats);
        self.progress.finish(format!(
            "{dataset}: {} collected, {} duplicate, {} error",
            stats.collected, stats.duplicate, stats.error
        ));

        log::info!(
            "{dataset}: done in {:.1}s, collected={} duplicate={} error={}",
            start.elapsed().as_secs_f64(),
            stats.collected,
            stats.duplicate,
            stats.error,
        );

        stats
    }

    async fn run_task(
        &self,
        task: &CollectionTask,
        stats: &mut CollectionStats,
    ) -> Result<(), CollectorError> {
        let dataset = task.dataset;
        let label = format!("{}/{}", task.region.id(), task.year);

        match self
            .ports
            .checker
            .is_collected(dataset, &task.region, &task.year)
            .await
        {
            Ok(true) => {
                log::debug!("{dataset}: {label} already collected");
                stats.record_duplicate();
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => {
                log::warn!("{dataset}: duplicate check failed for {label}: {e}");
                stats.record_error();
                return Ok(());
            }
        }

        let criteria =
            SearchCriteria::new(&task.region, &task.year).with_page_size(self.plan.page_size);
        let fetched = tokio::select! {
            reason = self.until_cancelled() => {
                return Err(CollectorError::Cancelled { reason });
            }
            fetched = async {
                self.ports.limiter.acquire().await;
                self.ports.source.fetch(dataset, &criteria).await
            } => fetched,
        };
        let records = match fetched {
            Ok(outcome) => outcome.into_records(),
            Err(e @ SourceError::Config { .. }) => return Err(e.into()),
            Err(e) => {
                log::warn!("{dataset}: fetch failed for {label}: {e}");
                stats.record_error();
                return Ok(());
            }
        };

        if records.is_empty() {
            log::debug!("{dataset}: no data for {label}");
            return Ok(());
        }

        let collected_at = Utc::now();
        for raw in &records {
            if let Err(e) = self.mapper.validate(raw) {
                log::warn!("{dataset}: skipping record in {label}: {e}");
                stats.record_error();
                self.publish(stats);
                continue;
            }

            let record = self
                .mapper
                .map_at(raw, &task.region, &task.year, collected_at);

            match self.ports.sink.save(&record).await {
                Ok(SaveOutcome::Saved) => stats.record_collected(),
                Ok(SaveOutcome::Duplicate) => stats.record_duplicate(),
                Err(e) => {
                    log::warn!("{dataset}: failed to save {}: {e}", record.natural_key);
                    stats.record_error();
                }
            }
            self.publish(stats);
        }

        log::debug!("{dataset}: {label} returned {} records", records.len());
        Ok(())
    }

    fn publish(&self, stats: &CollectionStats) {
        if let Some(tx) = &self.snapshots {
            tx.send_replace(stats.clone());
        }
    }

    fn cancellation(&self) -> Option<String> {
        self.cancel.as_ref().and_then(|rx| (*rx.borrow()).clone())
    }

    /// Resolves with the cancellation reason. Never resolves without a
    /// cancellation channel or once its sender is gone.
    async fn until_cancelled(&self) -> String {
        let Some(rx) = &self.cancel else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        let reason = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|reason| (*reason).clone());
        match reason {
            Some(reason) => reason,
            None => std::future::pending().await,
        }
    }
}
