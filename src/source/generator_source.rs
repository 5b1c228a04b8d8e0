use crate::error_log::ErrorLog;
use crate::record::{EventRecord, GenerateError, RecordGenerator};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("generator failed: {0}")]
    Generate(#[from] GenerateError),

    #[error("downstream closed after {produced} records")]
    ChannelClosed { produced: u64 },

    #[error("join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct SourceRunConfig {
    pub total_records: u64,
    /// Records produced between scheduler yields.
    pub chunk_size: usize,
    pub base_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSummary {
    pub produced: u64,
    /// Production stopped early because of a cancellation request.
    pub cancelled: bool,
}

/// Handle to a running source task.
pub struct SourceHandle {
    handle: JoinHandle<Result<SourceSummary, SourceError>>,
}

impl SourceHandle {
    /// Wait for the source to finish producing.
    pub async fn wait(self) -> Result<SourceSummary, SourceError> {
        self.handle.await?
    }
}

/// Spawn a task producing `total_records` records in index order.
///
/// Records are generated in chunks of `chunk_size`, yielding to the
/// scheduler after each chunk so upload completions are not starved. The
/// channel closes when the task ends, which is the end-of-stream signal.
///
/// A generator failure is logged as a stream error and ends the stream
/// without emitting the failed record. Cancellation is checked between
/// chunks.
pub fn spawn_source(
    generator: Arc<dyn RecordGenerator>,
    config: SourceRunConfig,
    output: mpsc::Sender<EventRecord>,
    error_log: Arc<ErrorLog>,
    cancel: CancellationToken,
) -> SourceHandle {
    let handle = tokio::spawn(async move {
        let result = produce(&*generator, &config, &output, &cancel).await;
        match &result {
            Ok(summary) => info!(
                produced = summary.produced,
                cancelled = summary.cancelled,
                "Source finished"
            ),
            Err(SourceError::ChannelClosed { produced }) => {
                warn!(produced = produced, "Source stopped, downstream closed")
            }
            Err(e) => error_log.log_stream_error("source", &e.to_string()),
        }
        result
    });

    SourceHandle { handle }
}

async fn produce(
    generator: &dyn RecordGenerator,
    config: &SourceRunConfig,
    output: &mpsc::Sender<EventRecord>,
    cancel: &CancellationToken,
) -> Result<SourceSummary, SourceError> {
    let chunk_size = config.chunk_size.max(1) as u64;
    let mut produced = 0u64;

    while produced < config.total_records {
        if cancel.is_cancelled() {
            debug!(produced = produced, "Source cancelled");
            return Ok(SourceSummary {
                produced,
                cancelled: true,
            });
        }

        let chunk_end = (produced + chunk_size).min(config.total_records);
        for index in produced..chunk_end {
            let record = generator.generate(index, config.base_timestamp)?;
            if output.send(record).await.is_err() {
                return Err(SourceError::ChannelClosed { produced });
            }
            produced += 1;
        }

        tokio::task::yield_now().await;
    }

    Ok(SourceSummary {
        produced,
        cancelled: false,
    })
}
