use crate::config::{load_config, validate_config, Config, ConfigError};
use crate::error_log::ErrorLog;
use crate::pipeline::{run_ingestion, IngestOptions, IngestReport, PipelineError};
use crate::store::{DocumentStore, HttpStore, MemoryStore, StoreError};
use chrono::Utc;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Command-line overrides for the `run` subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Number of records to generate
    #[arg(long)]
    pub total_records: Option<u64>,

    /// Documents per bulk request
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Maximum bulk requests in flight
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Upload to an in-process store instead of the configured endpoint
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(total_records) = self.total_records {
            config.ingest.total_records = total_records;
        }
        if let Some(batch_size) = self.batch_size {
            config.ingest.batch_size = batch_size;
        }
        if let Some(concurrency) = self.concurrency {
            config.ingest.concurrency = concurrency;
        }
    }
}

pub async fn run(config_path: Option<PathBuf>, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    run_pipeline(config_path, &args).await?;
    Ok(())
}

async fn run_pipeline(config_path: Option<PathBuf>, args: &RunArgs) -> Result<IngestReport, RunError> {
    let mut config = match &config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(path)?
        }
        None => {
            info!("No config file found, using defaults");
            Config::default()
        }
    };

    args.apply(&mut config);
    validate_config(&config)?;

    let store: Arc<dyn DocumentStore> = if args.dry_run {
        info!("Dry run, documents go to an in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        info!(url = %config.store.url, index = %config.store.index, "Connecting to document store");
        Arc::new(HttpStore::new(&config.store)?)
    };

    let error_log = Arc::new(ErrorLog::new(
        Uuid::new_v4(),
        Some(config.errors.path.clone()),
    ));

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    let signal_handle = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Shutdown signal received, finishing in-flight uploads");
            signal_cancel.cancel();
        }
    });

    let result = run_ingestion(ingest_options(&config), store, Arc::clone(&error_log), cancel).await;
    signal_handle.abort();

    match &result {
        Ok(report) => log_report(report),
        Err(e) => error!(
            error = %e,
            error_log = %config.errors.path.display(),
            "Ingestion failed"
        ),
    }

    Ok(result?)
}

pub fn ingest_options(config: &Config) -> IngestOptions {
    IngestOptions {
        total_records: config.ingest.total_records,
        batch_size: config.ingest.batch_size,
        concurrency: config.ingest.concurrency,
        base_timestamp: Utc::now(),
        index: config.store.index.clone(),
        chunk_size: config.ingest.chunk_size,
        channel_capacity: config.ingest.channel_capacity,
        progress_interval: config.progress.interval,
        error_flush_threshold: config.errors.flush_threshold,
        generator: None,
    }
}

fn log_report(report: &IngestReport) {
    let bulk = &report.bulk_metrics;
    info!(
        run_id = %report.run_id,
        inserted = report.total_inserted,
        failed = bulk.failed_documents,
        unsent = bulk.unsent_documents,
        batches = bulk.batches,
        elapsed_seconds = report.elapsed_seconds,
        rate = report.average_rate_per_second as u64,
        avg_batch_ms = bulk.average_duration().as_millis() as u64,
        max_batch_ms = bulk.max_duration.as_millis() as u64,
        "Run summary"
    );

    let snapshot = &report.metrics_snapshot;
    info!(
        records = snapshot.total_records,
        errors = snapshot.error_count,
        avg_response_ms = snapshot.response_time_ms.avg,
        p95_response_ms = snapshot.p95_response_time_ms,
        services = snapshot.services.len(),
        "Record metrics"
    );
}
