//! `DuckDB` accident record storage.
//!
//! One `accident_records` table holds every dataset type. The five natural
//! key columns form the primary key, so inserting an already-collected
//! record is a no-op that reports [`SaveOutcome::Duplicate`]. Common
//! severity and risk columns are stored flat for querying; the
//! dataset-specific detail and the risk factors are stored as JSON.

use std::path::Path;
use std::str::FromStr as _;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{Connection, params};
use safewalk_accident_models::{
    AccidentCounts, AccidentRecord, DatasetType, DerivedRiskMetrics, NaturalKey, RegionCode,
    RiskLevel,
};

use crate::{DbError, DuplicateChecker, PersistenceSink, SaveOutcome};

/// Stored row counts for one dataset type.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub dataset: DatasetType,
    pub records: u64,
    /// Rows classified `HIGH` or `VERY_HIGH`.
    pub high_risk: u64,
    pub max_risk_score: Option<f64>,
}

/// Thread-safe handle to the accident record database.
///
/// Clones share one connection. The async port implementations run each
/// query on the blocking thread pool.
#[derive(Clone)]
pub struct AccidentStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for AccidentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccidentStore").finish_non_exhaustive()
    }
}

impl AccidentStore {
    /// Opens (or creates) the database at `path` and ensures the schema
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the directory, connection, or schema creation
    /// fails.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }
        let conn = Connection::open(path)?;
        log::debug!("Opened accident store at {}", path.display());
        Self::from_connection(conn)
    }

    /// Opens a throwaway in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        create_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Whether any record of `dataset` exists for `region` in `year`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn has_task(
        &self,
        dataset: DatasetType,
        region: &RegionCode,
        year: &str,
    ) -> Result<bool, DbError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT EXISTS (
                SELECT 1 FROM accident_records
                WHERE dataset_type = ? AND province_code = ? AND district_code = ? AND year = ?
            )",
        )?;
        let exists: bool = stmt.query_row(
            params![
                dataset.as_ref(),
                region.province_code,
                region.district_code,
                year
            ],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Inserts `record` unless its natural key is already stored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if serialization or the insert fails.
    pub fn insert(&self, record: &AccidentRecord) -> Result<SaveOutcome, DbError> {
        let key = &record.natural_key;
        let factors_json = serde_json::to_string(&record.factors)?;
        let detail_json = serde_json::to_string(&record.detail)?;
        let (longitude, latitude) = record.coordinates().unzip();
        let collected_at = record
            .collected_at
            .format("%Y-%m-%d %H:%M:%S%.6f+00:00")
            .to_string();

        let conn = self.lock()?;
        let rows = conn.execute(
            "INSERT INTO accident_records (
                dataset_type, natural_key, province_code, district_code, year,
                province_name, district_name,
                accident_count, casualty_count, death_count,
                serious_injury_count, minor_injury_count, injury_report_count,
                fatality_rate, serious_injury_rate, risk_score, risk_level, risk_level_value,
                longitude, latitude, factors_json, detail_json, collected_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING",
            params![
                key.dataset_type.as_ref(),
                key.key,
                key.province_code,
                key.district_code,
                key.year,
                record.region.province_name,
                record.region.district_name,
                record.counts.accidents,
                record.counts.casualties,
                record.counts.deaths,
                record.counts.serious_injuries,
                record.counts.minor_injuries,
                record.counts.injury_reports,
                record.risk.fatality_rate,
                record.risk.serious_injury_rate,
                record.risk.risk_score,
                record.risk.risk_level.as_ref(),
                i16::from(record.risk.risk_level.value()),
                longitude,
                latitude,
                factors_json,
                detail_json,
                collected_at,
            ],
        )?;

        if rows == 0 {
            log::debug!("Duplicate record {key}");
            Ok(SaveOutcome::Duplicate)
        } else {
            Ok(SaveOutcome::Saved)
        }
    }

    /// Loads the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or a stored column cannot be
    /// decoded.
    pub fn find(&self, key: &NaturalKey) -> Result<Option<AccidentRecord>, DbError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT province_name, district_name,
                    accident_count, casualty_count, death_count,
                    serious_injury_count, minor_injury_count, injury_report_count,
                    fatality_rate, serious_injury_rate, risk_score, risk_level,
                    factors_json, detail_json, epoch_us(collected_at)
             FROM accident_records
             WHERE dataset_type = ? AND natural_key = ? AND province_code = ?
               AND district_code = ? AND year = ?",
        )?;

        let result = stmt.query_row(
            params![
                key.dataset_type.as_ref(),
                key.key,
                key.province_code,
                key.district_code,
                key.year
            ],
            |row| {
                Ok(StoredRow {
                    province_name: row.get(0)?,
                    district_name: row.get(1)?,
                    counts: AccidentCounts {
                        accidents: row.get(2)?,
                        casualties: row.get(3)?,
                        deaths: row.get(4)?,
                        serious_injuries: row.get(5)?,
                        minor_injuries: row.get(6)?,
                        injury_reports: row.get(7)?,
                    },
                    fatality_rate: row.get(8)?,
                    serious_injury_rate: row.get(9)?,
                    risk_score: row.get(10)?,
                    risk_level: row.get(11)?,
                    factors_json: row.get(12)?,
                    detail_json: row.get(13)?,
                    collected_at_us: row.get(14)?,
                })
            },
        );

        match result {
            Ok(row) => row.into_record(key).map(Some),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::DuckDb(e)),
        }
    }

    /// Returns the total number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn record_count(&self) -> Result<u64, DbError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT COUNT(*) FROM accident_records")?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Per-dataset row counts, ordered by dataset id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or a stored dataset id is
    /// unknown.
    pub fn summary(&self) -> Result<Vec<DatasetSummary>, DbError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT dataset_type,
                    COUNT(*),
                    COUNT(*) FILTER (WHERE risk_level_value >= 4),
                    MAX(risk_score)
             FROM accident_records
             GROUP BY dataset_type
             ORDER BY dataset_type",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<f64>>(3)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (dataset, records, high_risk, max_risk_score) = row?;
            summaries.push(DatasetSummary {
                dataset: parse_dataset(&dataset)?,
                records: u64::try_from(records).unwrap_or(0),
                high_risk: u64::try_from(high_risk).unwrap_or(0),
                max_risk_score,
            });
        }
        Ok(summaries)
    }

    /// Gets a metadata value from the `_meta` table.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn get_meta(&self, key: &str) -> Result<Option<String>, DbError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT value FROM _meta WHERE key = ?")?;
        match stmt.query_row([key], |row| row.get(0)) {
            Ok(v) => Ok(Some(v)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::DuckDb(e)),
        }
    }

    /// Sets a metadata value in the `_meta` table.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the upsert fails.
    pub fn set_meta(&self, key: &str, value: &str) -> Result<(), DbError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO _meta (key, value) VALUES (?, ?)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
            params![key, value],
        )?;
        Ok(())
    }
}

#[async_trait]
impl DuplicateChecker for AccidentStore {
    async fn is_collected(
        &self,
        dataset: DatasetType,
        region: &RegionCode,
        year: &str,
    ) -> Result<bool, DbError> {
        let store = self.clone();
        let region = region.clone();
        let year = year.to_string();
        tokio::task::spawn_blocking(move || store.has_task(dataset, &region, &year)).await?
    }
}

#[async_trait]
impl PersistenceSink for AccidentStore {
    async fn save(&self, record: &AccidentRecord) -> Result<SaveOutcome, DbError> {
        let store = self.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || store.insert(&record)).await?
    }
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS accident_records (
            dataset_type TEXT NOT NULL,
            natural_key TEXT NOT NULL,
            province_code TEXT NOT NULL,
            district_code TEXT NOT NULL,
            year TEXT NOT NULL,
            province_name TEXT NOT NULL,
            district_name TEXT NOT NULL,
            accident_count BIGINT,
            casualty_count BIGINT,
            death_count BIGINT,
            serious_injury_count BIGINT,
            minor_injury_count BIGINT,
            injury_report_count BIGINT,
            fatality_rate DOUBLE NOT NULL,
            serious_injury_rate DOUBLE NOT NULL,
            risk_score DOUBLE NOT NULL,
            risk_level TEXT NOT NULL,
            risk_level_value SMALLINT NOT NULL,
            longitude DOUBLE,
            latitude DOUBLE,
            factors_json TEXT NOT NULL,
            detail_json TEXT NOT NULL,
            collected_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (dataset_type, natural_key, province_code, district_code, year)
        );

        CREATE INDEX IF NOT EXISTS idx_accident_records_task
            ON accident_records (dataset_type, province_code, district_code, year);

        CREATE TABLE IF NOT EXISTS _meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    Ok(())
}

fn parse_dataset(value: &str) -> Result<DatasetType, DbError> {
    DatasetType::from_str(value).map_err(|_| DbError::Conversion {
        message: format!("unknown dataset type {value:?}"),
    })
}

struct StoredRow {
    province_name: String,
    district_name: String,
    counts: AccidentCounts,
    fatality_rate: f64,
    serious_injury_rate: f64,
    risk_score: f64,
    risk_level: String,
    factors_json: String,
    detail_json: String,
    collected_at_us: i64,
}

impl StoredRow {
    fn into_record(self, key: &NaturalKey) -> Result<AccidentRecord, DbError> {
        let risk_level = RiskLevel::from_str(&self.risk_level).map_err(|_| DbError::Conversion {
            message: format!("unknown risk level {:?}", self.risk_level),
        })?;
        let collected_at: DateTime<Utc> = DateTime::from_timestamp_micros(self.collected_at_us)
            .ok_or_else(|| DbError::Conversion {
                message: format!("timestamp out of range: {}us", self.collected_at_us),
            })?;

        Ok(AccidentRecord {
            natural_key: key.clone(),
            region: RegionCode {
                province_code: key.province_code.clone(),
                district_code: key.district_code.clone(),
                province_name: self.province_name,
                district_name: self.district_name,
            },
            year: key.year.clone(),
            counts: self.counts,
            factors: serde_json::from_str(&self.factors_json)?,
            risk: DerivedRiskMetrics {
                fatality_rate: self.fatality_rate,
                serious_injury_rate: self.serious_injury_rate,
                risk_score: self.risk_score,
                risk_level,
            },
            detail: serde_json::from_str(&self.detail_json)?,
            collected_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use safewalk_accident_models::{RecordDetail, RiskFactors, record::HotspotDetail};

    use super::*;

    fn gangnam() -> RegionCode {
        RegionCode::new("11", "680", "강남구")
    }

    fn record(dataset: DatasetType, key: &str, year: &str) -> AccidentRecord {
        AccidentRecord {
            natural_key: NaturalKey::new(dataset, key, &gangnam(), year),
            region: gangnam(),
            year: year.to_string(),
            counts: AccidentCounts {
                accidents: Some(10),
                casualties: Some(12),
                deaths: Some(2),
                serious_injuries: Some(3),
                minor_injuries: None,
                injury_reports: None,
            },
            factors: RiskFactors::default(),
            risk: DerivedRiskMetrics {
                fatality_rate: 16.67,
                serious_injury_rate: 41.67,
                risk_score: 61.33,
                risk_level: RiskLevel::High,
            },
            detail: RecordDetail::Hotspot(HotspotDetail {
                spot_name: Some("역삼역 부근".to_string()),
                longitude: Some(127.25),
                latitude: Some(37.5),
                ..HotspotDetail::default()
            }),
            collected_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn insert_then_find() {
        let store = AccidentStore::open_in_memory().unwrap();
        let rec = record(DatasetType::Pedestrian, "AFOS1", "2023");

        assert_eq!(store.insert(&rec).unwrap(), SaveOutcome::Saved);
        let loaded = store.find(&rec.natural_key).unwrap().unwrap();
        assert_eq!(loaded, rec);
    }

    #[test]
    fn second_insert_is_duplicate() {
        let store = AccidentStore::open_in_memory().unwrap();
        let rec = record(DatasetType::Pedestrian, "AFOS1", "2023");

        assert_eq!(store.insert(&rec).unwrap(), SaveOutcome::Saved);
        assert_eq!(store.insert(&rec).unwrap(), SaveOutcome::Duplicate);
        assert_eq!(store.record_count().unwrap(), 1);
    }

    #[test]
    fn same_key_in_other_dataset_or_year_is_distinct() {
        let store = AccidentStore::open_in_memory().unwrap();
        store
            .insert(&record(DatasetType::Pedestrian, "AFOS1", "2023"))
            .unwrap();
        assert_eq!(
            store
                .insert(&record(DatasetType::ElderlyPedestrian, "AFOS1", "2023"))
                .unwrap(),
            SaveOutcome::Saved
        );
        assert_eq!(
            store
                .insert(&record(DatasetType::Pedestrian, "AFOS1", "2022"))
                .unwrap(),
            SaveOutcome::Saved
        );
        assert_eq!(store.record_count().unwrap(), 3);
    }

    #[test]
    fn missing_record_is_none() {
        let store = AccidentStore::open_in_memory().unwrap();
        let key = NaturalKey::new(DatasetType::Holiday, "nope", &gangnam(), "2020");
        assert!(store.find(&key).unwrap().is_none());
    }

    #[tokio::test]
    async fn task_is_collected_once_any_record_exists() {
        let store = AccidentStore::open_in_memory().unwrap();
        let region = gangnam();

        assert!(
            !store
                .is_collected(DatasetType::Pedestrian, &region, "2023")
                .await
                .unwrap()
        );
        let outcome = store
            .save(&record(DatasetType::Pedestrian, "AFOS1", "2023"))
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Saved);

        assert!(
            store
                .is_collected(DatasetType::Pedestrian, &region, "2023")
                .await
                .unwrap()
        );
        assert!(
            !store
                .is_collected(DatasetType::Pedestrian, &region, "2022")
                .await
                .unwrap()
        );
        assert!(
            !store
                .is_collected(DatasetType::Holiday, &region, "2023")
                .await
                .unwrap()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_share_one_store() {
        let store = AccidentStore::open_in_memory().unwrap();
        let datasets = [DatasetType::Pedestrian, DatasetType::Holiday];

        // Writers alternate between two datasets, so each key is saved by
        // three writers at once.
        let handles: Vec<_> = (0..6)
            .map(|writer| {
                let store = store.clone();
                let dataset = datasets[writer % 2];
                tokio::spawn(async move {
                    let mut saved = 0_u64;
                    let mut duplicate = 0_u64;
                    for i in 0..10 {
                        let rec = record(dataset, &format!("AFOS{i}"), "2023");
                        match store.save(&rec).await.unwrap() {
                            SaveOutcome::Saved => saved += 1,
                            SaveOutcome::Duplicate => duplicate += 1,
                        }
                    }
                    (saved, duplicate)
                })
            })
            .collect();

        let mut saved = 0;
        let mut duplicate = 0;
        for handle in handles {
            let (s, d) = handle.await.unwrap();
            saved += s;
            duplicate += d;
        }

        assert_eq!(saved, 20);
        assert_eq!(duplicate, 40);
        assert_eq!(store.record_count().unwrap(), 20);
        for dataset in datasets {
            assert!(
                store
                    .is_collected(dataset, &gangnam(), "2023")
                    .await
                    .unwrap()
            );
        }
    }

    #[test]
    fn summary_counts_per_dataset() {
        let store = AccidentStore::open_in_memory().unwrap();
        store
            .insert(&record(DatasetType::Pedestrian, "A", "2023"))
            .unwrap();
        store
            .insert(&record(DatasetType::Pedestrian, "B", "2023"))
            .unwrap();
        let mut low = record(DatasetType::Holiday, "H", "2023");
        low.risk.risk_level = RiskLevel::Low;
        low.risk.risk_score = 70.0;
        store.insert(&low).unwrap();

        let summary = store.summary().unwrap();
        assert_eq!(summary.len(), 2);

        let holiday = summary
            .iter()
            .find(|s| s.dataset == DatasetType::Holiday)
            .unwrap();
        assert_eq!(holiday.records, 1);
        assert_eq!(holiday.high_risk, 0);

        let pedestrian = summary
            .iter()
            .find(|s| s.dataset == DatasetType::Pedestrian)
            .unwrap();
        assert_eq!(pedestrian.records, 2);
        assert_eq!(pedestrian.high_risk, 2);
        assert_eq!(pedestrian.max_risk_score, Some(61.33));
    }

    #[test]
    fn meta_round_trip() {
        let store = AccidentStore::open_in_memory().unwrap();
        assert_eq!(store.get_meta("last_run_at").unwrap(), None);
        store.set_meta("last_run_at", "2024-03-01").unwrap();
        store.set_meta("last_run_at", "2024-03-02").unwrap();
        assert_eq!(
            store.get_meta("last_run_at").unwrap().as_deref(),
            Some("2024-03-02")
        );
    }
}
