use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::record::EventRecord;
use crate::uploader::{BatchUploader, BulkDocument, BulkMetrics, UploadError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Run the metrics collector stage.
///
/// Observes every record and forwards it unchanged. Ends when the input
/// closes or the downstream stage goes away, returning the final snapshot.
pub async fn run_collector(
    mut input: mpsc::Receiver<EventRecord>,
    output: mpsc::Sender<EventRecord>,
    mut collector: MetricsCollector,
) -> MetricsSnapshot {
    info!("Metrics collector started");

    while let Some(record) = input.recv().await {
        collector.observe(&record);
        if output.send(record).await.is_err() {
            warn!(
                observed = collector.total_records(),
                "Uploader channel closed, collector stopping"
            );
            break;
        }
    }

    // Close our input so the source sees the hang-up instead of blocking.
    drop(input);

    let snapshot = collector.finish();
    info!(
        records = snapshot.total_records,
        errors = snapshot.error_count,
        p95_ms = snapshot.p95_response_time_ms,
        "Metrics collector finished"
    );
    snapshot
}

/// Run the uploader stage.
///
/// Feeds every incoming document to the uploader, then drains it once the
/// input closes. A latched upload failure stops intake early; the input is
/// dropped so upstream stages notice, and the drain still waits for every
/// request already sent.
pub async fn run_uploader<D: BulkDocument>(
    mut input: mpsc::Receiver<D>,
    mut uploader: BatchUploader<D>,
) -> (Result<BulkMetrics, UploadError>, BulkMetrics) {
    info!("Uploader started");

    while let Some(document) = input.recv().await {
        if let Err(e) = uploader.submit(document).await {
            warn!(error = %e, "Uploader refused document, stopping intake");
            break;
        }
    }

    drop(input);
    debug!(
        buffered = uploader.buffered(),
        in_flight = uploader.in_flight(),
        "Input closed, draining uploader"
    );

    let result = uploader.drain().await;
    (result, uploader.metrics())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_log::ErrorLog;
    use crate::record::{RecordGenerator, SyntheticGenerator};
    use crate::store::MemoryStore;
    use crate::uploader::UploaderConfig;
    use chrono::Utc;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_collector_forwards_in_order() {
        let (in_tx, in_rx) = mpsc::channel(16);
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let handle = tokio::spawn(run_collector(in_rx, out_tx, MetricsCollector::new()));

        let base = Utc::now();
        for i in 0..5 {
            in_tx.send(SyntheticGenerator.generate(i, base).unwrap()).await.unwrap();
        }
        drop(in_tx);

        let mut ids = Vec::new();
        while let Some(record) = out_rx.recv().await {
            ids.push(record.id);
        }
        let snapshot = handle.await.unwrap();

        assert_eq!(snapshot.total_records, 5);
        assert_eq!(ids.len(), 5);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_uploader_stage_drains_partial_batch() {
        let store = Arc::new(MemoryStore::new());
        let uploader = BatchUploader::new(
            UploaderConfig::new("events", 4, 2),
            store.clone(),
            Arc::new(ErrorLog::in_memory()),
        );
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(run_uploader(rx, uploader));

        let base = Utc::now();
        for i in 0..10 {
            tx.send(SyntheticGenerator.generate(i, base).unwrap()).await.unwrap();
        }
        drop(tx);

        let (result, metrics) = handle.await.unwrap();
        let drained = result.unwrap();
        assert_eq!(drained, metrics);
        assert_eq!(metrics.batches, 3);
        assert_eq!(metrics.total_inserted, 10);
        assert_eq!(store.documents(), 10);
    }
}
