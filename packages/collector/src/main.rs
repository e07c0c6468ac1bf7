#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the accident data collector.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use safewalk_accident_models::{DatasetType, regions};
use safewalk_cli_utils::IndicatifProgress;
use safewalk_collector::{
    config::{CollectorConfig, parse_datasets, split_list},
    dataset::CollectorPorts,
    orchestrator::CollectionOrchestrator,
};
use safewalk_collector_models::DataCollectionResult;
use safewalk_database::{paths, store::AccidentStore};
use safewalk_source::{endpoints, koroad::KoroadClient};

const META_LAST_RUN_AT: &str = "last_run_at";
const META_LAST_RUN_RESULT: &str = "last_run_result";

#[derive(Parser)]
#[command(name = "safewalk_collector", about = "KoROAD accident data collector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect accident data for every selected dataset type concurrently
    Collect {
        /// Comma-separated dataset types (e.g. "pedestrian,holiday").
        /// Overrides the config file and `SAFEWALK_DATASETS`.
        #[arg(long)]
        datasets: Option<String>,
        /// Comma-separated search years (e.g. "2022,2023")
        #[arg(long)]
        years: Option<String>,
        /// Comma-separated region ids (e.g. "11-680,26-440").
        /// If not specified, every region in the reference table is collected.
        #[arg(long)]
        regions: Option<String>,
        /// Database file (default: `data/safewalk.duckdb`)
        #[arg(long)]
        db: Option<PathBuf>,
        /// TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Abort the whole run after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// List dataset types with their endpoint and natural key
    Datasets,
    /// List the reference region table
    Regions,
    /// Show stored record counts per dataset type
    Summary {
        /// Database file (default: `data/safewalk.duckdb`)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = safewalk_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Collect {
            datasets,
            years,
            regions,
            db,
            config,
            timeout_secs,
        } => {
            let mut config = CollectorConfig::load(config.as_deref())?;
            config.apply_env()?;
            if let Some(list) = datasets {
                config.datasets = parse_datasets(&list)?;
            }
            if let Some(list) = years {
                config.years = split_list(&list);
            }
            if let Some(list) = regions {
                config.regions = split_list(&list);
            }
            if db.is_some() {
                config.db_path = db;
            }
            if timeout_secs.is_some() {
                config.timeout_secs = timeout_secs;
            }
            config.validate()?;
            log::debug!("{config:?}");

            let db_path = config.db_path.clone().unwrap_or_else(paths::accident_db_path);
            log::info!("Using database {}", db_path.display());
            let store = Arc::new(AccidentStore::open(&db_path)?);
            let client = Arc::new(KoroadClient::new(config.client_settings()?)?);

            let ports = CollectorPorts {
                source: client,
                checker: store.clone(),
                sink: store.clone(),
                limiter: Arc::new(config.rate_limiter()?),
            };

            let bars = multi.clone();
            let mut orchestrator = CollectionOrchestrator::new(ports, config.plan()?)
                .with_datasets(config.datasets.clone())
                .with_factors(config.factors.clone())
                .with_progress(Arc::new(move |dataset: DatasetType| {
                    IndicatifProgress::tasks_bar(&bars, dataset.as_ref())
                }));
            if let Some(timeout) = config.timeout() {
                orchestrator = orchestrator.with_timeout(timeout);
            }

            let result = orchestrator.run().await;
            print_result(&result);

            let finished_at = result.finished_at.unwrap_or_else(Utc::now);
            store.set_meta(META_LAST_RUN_AT, &finished_at.to_rfc3339())?;
            store.set_meta(META_LAST_RUN_RESULT, &serde_json::to_string(&result)?)?;

            if let Some(message) = result.error_message() {
                return Err(message.into());
            }
        }
        Commands::Datasets => {
            println!("{:<22} {:<24} {:<18} NAME", "DATASET", "PATH", "NATURAL KEY");
            println!("{}", "-".repeat(90));
            for endpoint in endpoints::all_endpoints()? {
                println!(
                    "{:<22} {:<24} {:<18} {}",
                    endpoint.dataset.as_ref(),
                    endpoint.path,
                    endpoint.dataset.natural_key_field(),
                    endpoint.dataset.label(),
                );
            }
        }
        Commands::Regions => {
            let all = regions::all_regions();
            println!("{:<8} {:<16} DISTRICT", "ID", "PROVINCE");
            println!("{}", "-".repeat(40));
            for region in &all {
                println!(
                    "{:<8} {:<16} {}",
                    region.id(),
                    region.province_name,
                    region.district_name
                );
            }
            println!("\n{} regions", all.len());
        }
        Commands::Summary { db } => {
            let db_path = db.unwrap_or_else(paths::accident_db_path);
            let store = AccidentStore::open(&db_path)?;

            println!(
                "{:<22} {:>10} {:>10} {:>10}",
                "DATASET", "RECORDS", "HIGH RISK", "MAX SCORE"
            );
            println!("{}", "-".repeat(56));
            for row in store.summary()? {
                println!(
                    "{:<22} {:>10} {:>10} {:>10}",
                    row.dataset.as_ref(),
                    row.records,
                    row.high_risk,
                    row.max_risk_score
                        .map_or_else(|| "-".to_string(), |s| format!("{s:.2}")),
                );
            }
            println!("\nTotal records: {}", store.record_count()?);
            if let Some(at) = store.get_meta(META_LAST_RUN_AT)? {
                println!("Last run: {at}");
            }
        }
    }

    Ok(())
}

fn print_result(result: &DataCollectionResult) {
    println!();
    println!(
        "{:<22} {:<10} {:>10} {:>10} {:>8} {:>10}",
        "DATASET", "STATE", "COLLECTED", "DUPLICATE", "ERROR", "ELAPSED"
    );
    println!("{}", "-".repeat(76));
    for stats in result.datasets.values() {
        println!(
            "{:<22} {:<10} {:>10} {:>10} {:>8} {:>10}",
            stats.dataset_type.as_ref(),
            stats.state.as_ref(),
            stats.collected,
            stats.duplicate,
            stats.error,
            stats
                .elapsed()
                .map_or_else(|| "-".to_string(), |d| format!("{}s", d.num_seconds())),
        );
    }
    println!("{}", "-".repeat(76));
    println!(
        "{:<22} {:<10} {:>10} {:>10} {:>8}",
        "TOTAL",
        if result.success { "OK" } else { "FAILED" },
        result.total_collected,
        result.total_duplicate,
        result.total_error,
    );
    for error in &result.errors {
        println!("  ! {error}");
    }
}
