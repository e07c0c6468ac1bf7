//! Concurrent collection of every requested dataset type.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use safewalk_accident_models::{DatasetType, RiskFactors};
use safewalk_collector_models::{CollectionStats, DataCollectionResult};
use safewalk_source::{mapper::RecordMapper, progress::ProgressCallback};
use tokio::sync::watch;

use crate::{
    dataset::{CollectorPorts, DatasetCollector},
    plan::CollectionPlan,
};

/// Time collectors get to finish the page they are saving once the run
/// timeout has expired. Collectors still running after it are aborted.
pub const CANCEL_GRACE: Duration = Duration::from_secs(30);

const TIMED_OUT: &str = "timed out";

/// Builds the progress sink for one dataset's collector.
pub type ProgressFactory = Arc<dyn Fn(DatasetType) -> Arc<dyn ProgressCallback> + Send + Sync>;

/// Spawns one [`DatasetCollector`] per dataset type and waits for all of
/// them.
///
/// Collectors share the ports, and with them the rate limiter, but nothing
/// else. A collector that fails, panics or runs out of time is reported in
/// the result without disturbing the others.
pub struct CollectionOrchestrator {
    ports: CollectorPorts,
    plan: Arc<CollectionPlan>,
    datasets: Vec<DatasetType>,
    factors: BTreeMap<DatasetType, RiskFactors>,
    progress: Option<ProgressFactory>,
    timeout: Option<Duration>,
}

impl CollectionOrchestrator {
    /// Orchestrator over all six dataset types.
    #[must_use]
    pub fn new(ports: CollectorPorts, plan: CollectionPlan) -> Self {
        Self {
            ports,
            plan: Arc::new(plan),
            datasets: DatasetType::all().to_vec(),
            factors: BTreeMap::new(),
            progress: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_datasets(mut self, datasets: Vec<DatasetType>) -> Self {
        self.datasets = datasets;
        self
    }

    /// Contextual risk factors applied to every record of a dataset.
    #[must_use]
    pub fn with_factors(mut self, factors: BTreeMap<DatasetType, RiskFactors>) -> Self {
        self.factors = factors;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFactory) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Upper bound on the whole run. When it expires, running collectors
    /// are cancelled, allowed [`CANCEL_GRACE`] to finish the page in hand,
    /// and reported as failed with their partial counts.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn datasets(&self) -> &[DatasetType] {
        &self.datasets
    }

    #[must_use]
    pub fn plan(&self) -> &CollectionPlan {
        &self.plan
    }

    /// Builds the collector for `dataset` with its configured factors.
    #[must_use]
    pub fn collector(&self, dataset: DatasetType) -> DatasetCollector {
        let mapper = RecordMapper::new(dataset)
            .with_factors(self.factors.get(&dataset).copied().unwrap_or_default());
        let collector = DatasetCollector::new(mapper, self.ports.clone(), Arc::clone(&self.plan));
        match &self.progress {
            Some(factory) => collector.with_progress(factory(dataset)),
            None => collector,
        }
    }

    pub async fn run(&self) -> DataCollectionResult {
        let mut result = DataCollectionResult::new(Utc::now());

        log::info!(
            "Starting collection of {} datasets over {} regions x {} years",
            self.datasets.len(),
            self.plan.regions.len(),
            self.plan.years.len(),
        );

        let (cancel_tx, cancel_rx) = watch::channel(None);
        let mut snapshots = Vec::with_capacity(self.datasets.len());
        let mut handles = Vec::with_capacity(self.datasets.len());
        for &dataset in &self.datasets {
            let (tx, rx) = watch::channel(CollectionStats::new(dataset));
            let collector = self
                .collector(dataset)
                .with_snapshots(tx)
                .with_cancellation(cancel_rx.clone());
            handles.push(tokio::spawn(async move { collector.run().await }));
            snapshots.push((dataset, rx));
        }

        let aborts: Vec<_> = handles.iter().map(tokio::task::JoinHandle::abort_handle).collect();
        let mut joined = std::pin::pin!(join_all(handles));

        let outcomes = match self.timeout {
            Some(limit) => {
                if let Ok(outcomes) = tokio::time::timeout(limit, joined.as_mut()).await {
                    Some(outcomes)
                } else {
                    log::error!(
                        "Collection timed out after {}s, stopping collectors",
                        limit.as_secs()
                    );
                    cancel_tx.send_replace(Some(TIMED_OUT.to_string()));
                    if let Ok(outcomes) = tokio::time::timeout(CANCEL_GRACE, joined.as_mut()).await
                    {
                        Some(outcomes)
                    } else {
                        log::error!(
                            "Collectors still running after {}s grace, aborting",
                            CANCEL_GRACE.as_secs()
                        );
                        for handle in &aborts {
                            handle.abort();
                        }
                        None
                    }
                }
            }
            None => Some(joined.await),
        };

        if let Some(outcomes) = outcomes {
            for ((dataset, rx), outcome) in snapshots.iter().zip(outcomes) {
                match outcome {
                    Ok(stats) => result.merge(stats),
                    Err(e) => {
                        log::error!("{dataset} collector did not finish: {e}");
                        salvage(&mut result, *dataset, rx, &format!("collector aborted: {e}"));
                    }
                }
            }
        } else {
            for (dataset, rx) in &snapshots {
                salvage(&mut result, *dataset, rx, TIMED_OUT);
            }
        }

        result.finish(Utc::now());
        log_summary(&result);
        result
    }
}

/// Merges the last published stats of a collector that did not return,
/// failing them with `message` unless they had already finished.
fn salvage(
    result: &mut DataCollectionResult,
    dataset: DatasetType,
    snapshot: &watch::Receiver<CollectionStats>,
    message: &str,
) {
    let stats = snapshot.borrow().clone();
    let finished = stats.is_finished();
    result.merge(stats);
    if !finished {
        result.record_failure(dataset, Utc::now(), message);
    }
}

#[allow(clippy::cast_precision_loss)]
fn log_summary(result: &DataCollectionResult) {
    for stats in result.datasets.values() {
        log::info!(
            "  {:<22} {:>8} collected {:>8} duplicate {:>6} error  [{}]",
            stats.dataset_type.to_string(),
            stats.collected,
            stats.duplicate,
            stats.error,
            stats.state,
        );
    }

    let secs = result
        .elapsed()
        .map_or(0.0, |d| d.num_milliseconds() as f64 / 1000.0);
    if result.success {
        log::info!(
            "Collection finished in {secs:.1}s: {} collected, {} duplicate, {} error",
            result.total_collected,
            result.total_duplicate,
            result.total_error,
        );
    } else {
        log::error!(
            "Collection finished with failures in {secs:.1}s: {}",
            result.error_message().unwrap_or_default()
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use safewalk_accident_models::HolidayPeriodType;
    use safewalk_collector_models::CollectorState;
    use safewalk_source::SourceError;
    use safewalk_source_models::FetchOutcome;
    use tokio::time::Instant;

    use super::*;
    use crate::testing::{FakeSource, MemoryStore, plan, record_for, unlimited};

    fn ports(source: &Arc<FakeSource>, store: &Arc<MemoryStore>) -> CollectorPorts {
        CollectorPorts {
            source: source.clone(),
            checker: store.clone(),
            sink: store.clone(),
            limiter: unlimited(),
        }
    }

    fn one_record_each() -> FakeSource {
        FakeSource::new(|_, dataset, criteria| {
            Ok(FetchOutcome::Records(vec![record_for(
                dataset,
                &format!("{dataset}-{}", criteria.year),
            )]))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn datasets_run_concurrently() {
        let source = Arc::new(one_record_each().with_delay(Duration::from_secs(1)));
        let store = Arc::new(MemoryStore::default());
        let start = Instant::now();

        let result = CollectionOrchestrator::new(ports(&source, &store), plan(1, 2))
            .run()
            .await;

        // six collectors x two sequential one-second fetches
        assert!(start.elapsed() < Duration::from_secs(3));
        assert!(result.success);
        assert_eq!(result.datasets.len(), 6);
        assert_eq!(result.total_collected, 12);
        assert_eq!(store.len(), 12);
        for stats in result.datasets.values() {
            assert_eq!(stats.state, CollectorState::Completed);
            assert_eq!(stats.collected, 2);
        }
    }

    #[tokio::test]
    async fn one_failing_collector_leaves_others_intact() {
        let source = Arc::new(FakeSource::new(|_, dataset, criteria| {
            if dataset == DatasetType::LinkRiskArea {
                return Err(SourceError::Config {
                    message: "endpoint missing".to_string(),
                });
            }
            Ok(FetchOutcome::Records(vec![record_for(
                dataset,
                &format!("{dataset}-{}", criteria.year),
            )]))
        }));
        let store = Arc::new(MemoryStore::default());

        let result = CollectionOrchestrator::new(ports(&source, &store), plan(1, 3))
            .run()
            .await;

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("LINK_RISK_AREA:"));
        assert_eq!(result.total_collected, 15);
        let failed = result.get(DatasetType::LinkRiskArea).unwrap();
        assert_eq!(failed.state, CollectorState::Failed);
        assert_eq!(failed.collected, 0);
        assert!(result.get(DatasetType::Holiday).unwrap().success);
    }

    #[tokio::test]
    async fn panicking_collector_is_reported() {
        let source = Arc::new(FakeSource::new(|_, dataset, _| {
            assert_ne!(dataset, DatasetType::Holiday, "malformed holiday payload");
            Ok(FetchOutcome::NoData)
        }));
        let store = Arc::new(MemoryStore::default());

        let result = CollectionOrchestrator::new(ports(&source, &store), plan(1, 1))
            .with_datasets(vec![DatasetType::Pedestrian, DatasetType::Holiday])
            .run()
            .await;

        assert!(!result.success);
        assert_eq!(result.datasets.len(), 2);
        assert!(result.get(DatasetType::Pedestrian).unwrap().success);
        let holiday = result.get(DatasetType::Holiday).unwrap();
        assert_eq!(holiday.state, CollectorState::Failed);
        assert!(
            holiday
                .error_message
                .as_deref()
                .is_some_and(|m| m.starts_with("collector aborted"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_keeps_partial_counts() {
        let source = Arc::new(one_record_each().with_delay(Duration::from_secs(10)));
        let store = Arc::new(MemoryStore::default());

        let result = CollectionOrchestrator::new(ports(&source, &store), plan(1, 3))
            .with_datasets(vec![DatasetType::Pedestrian, DatasetType::AccidentStatistics])
            .with_timeout(Duration::from_secs(15))
            .run()
            .await;

        assert!(!result.success);
        assert_eq!(result.errors.len(), 2);
        for stats in result.datasets.values() {
            assert_eq!(stats.state, CollectorState::Failed);
            assert_eq!(stats.tasks_processed, 1);
            assert_eq!(stats.collected, 1);
            assert_eq!(stats.error_message.as_deref(), Some("timed out"));
        }
        assert_eq!(result.total_collected, 2);
    }

    fn three_records_each() -> FakeSource {
        FakeSource::new(|_, dataset, criteria| {
            Ok(FetchOutcome::Records(
                (0..3)
                    .map(|i| record_for(dataset, &format!("{dataset}-{}-{i}", criteria.year)))
                    .collect(),
            ))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_lets_slow_saves_finish_and_counts_them() {
        let source = Arc::new(three_records_each());
        let store = Arc::new(MemoryStore::default().with_save_delay(Duration::from_secs(10)));

        // saves land at 10s, 20s and 30s; the timeout fires at 25s
        let result = CollectionOrchestrator::new(ports(&source, &store), plan(1, 2))
            .with_datasets(vec![DatasetType::Pedestrian])
            .with_timeout(Duration::from_secs(25))
            .run()
            .await;

        assert!(!result.success);
        let stats = result.get(DatasetType::Pedestrian).unwrap();
        assert_eq!(stats.state, CollectorState::Failed);
        assert_eq!(stats.error_message.as_deref(), Some("timed out"));
        assert_eq!(stats.tasks_processed, 1);
        assert_eq!(stats.collected, 3);
        assert_eq!(result.total_collected, store.len() as u64);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn collectors_past_grace_are_aborted_with_saved_counts() {
        let source = Arc::new(three_records_each());
        let store = Arc::new(MemoryStore::default().with_save_delay(Duration::from_secs(100)));
        let start = Instant::now();

        // first save lands at 100s, the second would at 200s but the
        // collector is aborted at 150s + grace
        let result = CollectionOrchestrator::new(ports(&source, &store), plan(1, 1))
            .with_datasets(vec![DatasetType::Holiday])
            .with_timeout(Duration::from_secs(150))
            .run()
            .await;

        assert!(start.elapsed() < Duration::from_secs(200));
        let stats = result.get(DatasetType::Holiday).unwrap();
        assert_eq!(stats.state, CollectorState::Failed);
        assert_eq!(stats.error_message.as_deref(), Some("timed out"));
        assert_eq!(stats.collected, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(result.total_collected, 1);
    }

    #[tokio::test]
    async fn progress_factory_and_factors_are_applied() {
        struct Counter(AtomicU64);

        impl ProgressCallback for Counter {
            fn set_total(&self, _total: u64) {}
            fn inc(&self, delta: u64) {
                self.0.fetch_add(delta, Ordering::Relaxed);
            }
            fn set_message(&self, _msg: String) {}
            fn finish(&self, _msg: String) {}
        }

        let counter = Arc::new(Counter(AtomicU64::new(0)));
        let shared = Arc::clone(&counter);
        let source = Arc::new(one_record_each());
        let store = Arc::new(MemoryStore::default());

        let factors = BTreeMap::from([(
            DatasetType::Holiday,
            RiskFactors {
                holiday_period: Some(HolidayPeriodType::Chuseok),
                ..RiskFactors::default()
            },
        )]);

        let orchestrator = CollectionOrchestrator::new(ports(&source, &store), plan(2, 2))
            .with_datasets(vec![DatasetType::Holiday])
            .with_factors(factors)
            .with_progress(Arc::new(move |_: DatasetType| -> Arc<dyn ProgressCallback> {
                shared.clone()
            }));

        let result = orchestrator.run().await;
        assert!(result.success);
        assert_eq!(counter.0.load(Ordering::Relaxed), 4);

        let records = store.records();
        assert_eq!(records.len(), 4);
        assert!(
            records
                .iter()
                .all(|r| r.factors.holiday_period == Some(HolidayPeriodType::Chuseok))
        );
    }
}
