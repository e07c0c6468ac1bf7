//! In-memory fakes for the collector's ports.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use safewalk_accident_models::{
    AccidentRecord, DatasetType, HotspotItem, NaturalKey, RawAccidentRecord, RecordShape,
    RegionCode, RiskAreaItem, StatisticsItem, regions::all_regions,
};
use safewalk_database::{DbError, DuplicateChecker, PersistenceSink, SaveOutcome};
use safewalk_source::{AccidentSource, SourceError};
use safewalk_source_models::{FetchOutcome, SearchCriteria};
use tokio::time::Instant;

use crate::{plan::CollectionPlan, rate_limit::RateLimiter};

type Responder =
    dyn Fn(usize, DatasetType, &SearchCriteria) -> Result<FetchOutcome, SourceError> + Send + Sync;

#[derive(Debug, Clone)]
pub struct SourceCall {
    pub dataset: DatasetType,
    pub criteria: SearchCriteria,
    pub at: Instant,
}

/// Source answering from a closure given the zero-based call index.
pub struct FakeSource {
    respond: Box<Responder>,
    delay: Duration,
    calls: Mutex<Vec<SourceCall>>,
}

impl FakeSource {
    pub fn new(
        respond: impl Fn(usize, DatasetType, &SearchCriteria) -> Result<FetchOutcome, SourceError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleeps for `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccidentSource for FakeSource {
    async fn fetch(
        &self,
        dataset: DatasetType,
        criteria: &SearchCriteria,
    ) -> Result<FetchOutcome, SourceError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(SourceCall {
                dataset,
                criteria: criteria.clone(),
                at: Instant::now(),
            });
            calls.len() - 1
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.respond)(index, dataset, criteria)
    }
}

/// Store keeping records in a map. Saves of records whose key equals
/// `fail_key` return an error.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<NaturalKey, AccidentRecord>>,
    fail_key: Option<String>,
    save_delay: Duration,
}

impl MemoryStore {
    pub fn failing_on(key: &str) -> Self {
        Self {
            fail_key: Some(key.to_string()),
            ..Self::default()
        }
    }

    /// Sleeps for `delay` before writing each record.
    pub fn with_save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = delay;
        self
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn records(&self) -> Vec<AccidentRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl DuplicateChecker for MemoryStore {
    async fn is_collected(
        &self,
        dataset: DatasetType,
        region: &RegionCode,
        year: &str,
    ) -> Result<bool, DbError> {
        Ok(self.records.lock().unwrap().keys().any(|k| {
            k.dataset_type == dataset
                && k.province_code == region.province_code
                && k.district_code == region.district_code
                && k.year == year
        }))
    }
}

#[async_trait]
impl PersistenceSink for MemoryStore {
    async fn save(&self, record: &AccidentRecord) -> Result<SaveOutcome, DbError> {
        if !self.save_delay.is_zero() {
            tokio::time::sleep(self.save_delay).await;
        }
        if self.fail_key.as_deref() == Some(record.natural_key.key.as_str()) {
            return Err(DbError::Conversion {
                message: "disk full".to_string(),
            });
        }
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.natural_key) {
            return Ok(SaveOutcome::Duplicate);
        }
        records.insert(record.natural_key.clone(), record.clone());
        Ok(SaveOutcome::Saved)
    }
}

/// Pedestrian-style hotspot row with the worked example's counts.
pub fn hotspot(afos_id: &str) -> RawAccidentRecord {
    RawAccidentRecord::Hotspot(HotspotItem {
        afos_id: Some(afos_id.to_string()),
        accident_count: Some(15),
        casualty_count: Some(18),
        death_count: Some(2),
        serious_injury_count: Some(5),
        minor_injury_count: Some(10),
        injury_report_count: Some(1),
        ..HotspotItem::default()
    })
}

/// A valid row of `dataset`'s shape keyed by `key`.
pub fn record_for(dataset: DatasetType, key: &str) -> RawAccidentRecord {
    match dataset.shape() {
        RecordShape::Hotspot => hotspot(key),
        RecordShape::Statistics => RawAccidentRecord::Statistics(StatisticsItem {
            classification: Some(key.to_string()),
            accident_count: Some(40),
            death_count: Some(1),
            ..StatisticsItem::default()
        }),
        RecordShape::RiskArea => RawAccidentRecord::RiskArea(RiskAreaItem {
            area_name: Some(key.to_string()),
            accident_count: Some(7),
            death_count: Some(1),
            ..RiskAreaItem::default()
        }),
    }
}

/// Plan over the first `regions` reference regions and `years` years
/// starting at 2017.
pub fn plan(regions: usize, years: usize) -> CollectionPlan {
    CollectionPlan {
        regions: all_regions().into_iter().take(regions).collect(),
        years: (2017..).take(years).map(|y: u32| y.to_string()).collect(),
        page_size: 1000,
    }
}

pub fn unlimited() -> Arc<RateLimiter> {
    Arc::new(RateLimiter::with_interval(Duration::ZERO))
}
