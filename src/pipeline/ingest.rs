use super::channel::create_channel;
use super::runner::{run_collector, run_uploader};
use crate::error_log::ErrorLog;
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::progress::{run_reporter, ProgressReporter};
use crate::record::{EventRecord, RecordGenerator, SyntheticGenerator};
use crate::source::{spawn_source, SourceError, SourceRunConfig};
use crate::store::{DocumentStore, StoreError};
use crate::uploader::{BatchUploader, BulkMetrics, UploadError, UploaderConfig};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Errors that end an ingestion run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("document store unreachable: {0}")]
    StoreUnreachable(#[source] StoreError),

    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("source failed: {0}")]
    Source(#[from] SourceError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Parameters of one ingestion run.
#[derive(Clone)]
pub struct IngestOptions {
    pub total_records: u64,
    pub batch_size: usize,
    pub concurrency: usize,
    pub base_timestamp: DateTime<Utc>,
    /// Target collection for every document.
    pub index: String,
    pub chunk_size: usize,
    pub channel_capacity: usize,
    pub progress_interval: Duration,
    pub error_flush_threshold: usize,
    /// Replaces the built-in synthetic generator.
    pub generator: Option<Arc<dyn RecordGenerator>>,
}

impl IngestOptions {
    pub fn new(total_records: u64, batch_size: usize, concurrency: usize) -> Self {
        Self {
            total_records,
            batch_size,
            concurrency,
            base_timestamp: Utc::now(),
            index: "events".to_string(),
            chunk_size: 100,
            channel_capacity: 100,
            progress_interval: Duration::from_secs(2),
            error_flush_threshold: 1000,
            generator: None,
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub total_inserted: u64,
    pub elapsed_seconds: f64,
    pub average_rate_per_second: f64,
    pub bulk_metrics: BulkMetrics,
    pub metrics_snapshot: MetricsSnapshot,
}

/// Run the whole pipeline: source, metrics collector, uploader and progress
/// reporter.
///
/// Returns once every record has been produced and every batch has
/// settled. The error log is flushed before returning, on success and on
/// failure alike. Cancelling `cancel` stops the source between chunks; what
/// was already produced is still uploaded and accounted for.
pub async fn run_ingestion(
    options: IngestOptions,
    store: Arc<dyn DocumentStore>,
    error_log: Arc<ErrorLog>,
    cancel: CancellationToken,
) -> Result<IngestReport, PipelineError> {
    let result = run_stages(options, store, &error_log, cancel).await;

    match error_log.flush().await {
        Ok(0) => {}
        Ok(count) => info!(count = count, "Error log flushed"),
        Err(e) => warn!(error = %e, "Failed to flush error log"),
    }

    result
}

async fn run_stages(
    options: IngestOptions,
    store: Arc<dyn DocumentStore>,
    error_log: &Arc<ErrorLog>,
    cancel: CancellationToken,
) -> Result<IngestReport, PipelineError> {
    let run_id = error_log.run_id();
    info!(
        run_id = %run_id,
        total_records = options.total_records,
        batch_size = options.batch_size,
        concurrency = options.concurrency,
        index = %options.index,
        "Starting ingestion"
    );

    if let Err(e) = store.ping().await {
        error_log.log_connection_error("pipeline", &e.to_string(), None);
        return Err(PipelineError::StoreUnreachable(e));
    }

    let started = Instant::now();
    let generator = options
        .generator
        .clone()
        .unwrap_or_else(|| Arc::new(SyntheticGenerator) as Arc<dyn RecordGenerator>);

    let (source_tx, source_rx) = create_channel::<EventRecord>(options.channel_capacity);
    let (upload_tx, upload_rx) = create_channel::<EventRecord>(options.channel_capacity);
    let (progress_tx, progress_rx) = create_channel(options.channel_capacity);

    let source = spawn_source(
        generator,
        SourceRunConfig {
            total_records: options.total_records,
            chunk_size: options.chunk_size,
            base_timestamp: options.base_timestamp,
        },
        source_tx,
        Arc::clone(error_log),
        cancel,
    );

    let collector_handle = tokio::spawn(run_collector(
        source_rx,
        upload_tx,
        MetricsCollector::new(),
    ));

    let reporter_handle = tokio::spawn(run_reporter(
        progress_rx,
        ProgressReporter::new(options.progress_interval),
    ));

    let mut uploader_config =
        UploaderConfig::new(options.index.clone(), options.batch_size, options.concurrency);
    uploader_config.expected_total = options.total_records;
    uploader_config.error_flush_threshold = options.error_flush_threshold;
    let uploader = BatchUploader::new(uploader_config, store, Arc::clone(error_log))
        .with_progress(progress_tx);
    let uploader_handle = tokio::spawn(run_uploader(upload_rx, uploader));

    // The uploader finishes last in the happy path: it only drains after
    // the collector, and therefore the source, has closed its input.
    let (upload_result, bulk_metrics) = uploader_handle.await?;
    let source_result = source.wait().await;
    let metrics_snapshot = collector_handle.await?;
    reporter_handle.await?;

    let elapsed = started.elapsed();

    if let Err(e) = upload_result {
        error!(
            error = %e,
            inserted = bulk_metrics.total_inserted,
            failed = bulk_metrics.failed_documents,
            "Ingestion failed during upload"
        );
        return Err(e.into());
    }

    match source_result {
        Ok(summary) if summary.cancelled => {
            warn!(produced = summary.produced, "Ingestion cancelled before all records were produced");
        }
        Ok(_) => {}
        Err(e) => {
            error!(error = %e, inserted = bulk_metrics.total_inserted, "Ingestion failed in source");
            return Err(e.into());
        }
    }

    let elapsed_seconds = elapsed.as_secs_f64();
    let average_rate_per_second = if elapsed_seconds > 0.0 {
        bulk_metrics.total_inserted as f64 / elapsed_seconds
    } else {
        0.0
    };

    info!(
        run_id = %run_id,
        inserted = bulk_metrics.total_inserted,
        failed = bulk_metrics.failed_documents,
        batches = bulk_metrics.batches,
        elapsed_seconds = elapsed_seconds,
        rate = average_rate_per_second as u64,
        "Ingestion complete"
    );

    Ok(IngestReport {
        run_id,
        total_inserted: bulk_metrics.total_inserted,
        elapsed_seconds,
        average_rate_per_second,
        bulk_metrics,
        metrics_snapshot,
    })
}
