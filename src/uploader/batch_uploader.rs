use super::batch::Batch;
use super::bulk::{correlate, serialize_batch};
use super::metrics::BulkMetrics;
use super::BulkDocument;
use crate::error_log::ErrorLog;
use crate::progress::ProgressEvent;
use crate::store::{BulkResponse, DocumentStore, StoreError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum UploadError {
    #[error("bulk request for batch {sequence} failed: {message}")]
    Transport { sequence: u64, message: String },

    #[error("upload task failed: {0}")]
    TaskFailed(String),

    #[error("uploader already drained")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Target collection named in every action line.
    pub index: String,
    pub batch_size: usize,
    /// Maximum number of bulk requests in flight.
    pub concurrency: usize,
    /// Record count the run is aiming for, carried on progress events.
    pub expected_total: u64,
    /// Flush the error log once it buffers this many entries.
    pub error_flush_threshold: usize,
}

impl UploaderConfig {
    pub fn new(index: impl Into<String>, batch_size: usize, concurrency: usize) -> Self {
        Self {
            index: index.into(),
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
            expected_total: 0,
            error_flush_threshold: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploaderState {
    Accepting,
    Flushing,
    AwaitingSlot,
    Draining,
    Done,
    Failed,
}

struct SettledBatch<D> {
    batch: Batch<D>,
    elapsed: Duration,
    result: Result<BulkResponse, StoreError>,
}

/// Buffers documents into batches and ships them with bounded concurrency.
///
/// At most `concurrency` bulk requests run at once. A `submit` that fills a
/// batch while every slot is taken does not return until one request
/// settles, whichever finishes first, so a fast producer is held back and
/// memory stays near `concurrency * batch_size` documents plus the partial
/// buffer.
///
/// A transport failure latches: later submits fail fast, but requests that
/// are already out are still awaited by [`BatchUploader::drain`] so the
/// counters stay exact. Dropping an uploader without draining it aborts its
/// in-flight requests, and their documents are then missing from the
/// metrics.
pub struct BatchUploader<D: BulkDocument> {
    config: UploaderConfig,
    store: Arc<dyn DocumentStore>,
    error_log: Arc<ErrorLog>,
    progress: Option<mpsc::Sender<ProgressEvent>>,
    buffer: Vec<D>,
    in_flight: JoinSet<SettledBatch<D>>,
    metrics: BulkMetrics,
    state: UploaderState,
    failure: Option<UploadError>,
    next_sequence: u64,
    drained: bool,
}

impl<D: BulkDocument> BatchUploader<D> {
    pub fn new(config: UploaderConfig, store: Arc<dyn DocumentStore>, error_log: Arc<ErrorLog>) -> Self {
        let buffer = Vec::with_capacity(config.batch_size);
        Self {
            config,
            store,
            error_log,
            progress: None,
            buffer,
            in_flight: JoinSet::new(),
            metrics: BulkMetrics::default(),
            state: UploaderState::Accepting,
            failure: None,
            next_sequence: 0,
            drained: false,
        }
    }

    /// Emit a [`ProgressEvent`] on `sender` after every settled batch.
    pub fn with_progress(mut self, sender: mpsc::Sender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Enqueue one document.
    ///
    /// Requests that finished since the last call are settled first, so a
    /// transport failure is noticed on the next submit. Suspends while all
    /// concurrency slots are busy. Fails immediately, without taking the
    /// document, once a failure has been latched or the uploader has been
    /// drained.
    pub async fn submit(&mut self, document: D) -> Result<(), UploadError> {
        self.collect_settled().await;
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        if self.drained {
            return Err(UploadError::Closed);
        }

        self.buffer.push(document);
        if self.buffer.len() >= self.config.batch_size {
            self.flush_buffer();
            self.collect_settled().await;
            self.wait_for_slot().await;
        }

        Ok(())
    }

    /// Flush the partial buffer, wait for every outstanding request and
    /// return the final counters.
    ///
    /// Calling it again returns the same result without doing any work.
    pub async fn drain(&mut self) -> Result<BulkMetrics, UploadError> {
        if !self.drained {
            self.state = UploaderState::Draining;
            self.flush_buffer();

            while self.settle_next().await {}

            self.drained = true;
            self.state = if self.failure.is_some() {
                UploaderState::Failed
            } else {
                UploaderState::Done
            };

            info!(
                batches = self.metrics.batches,
                inserted = self.metrics.total_inserted,
                failed = self.metrics.failed_documents,
                unsent = self.metrics.unsent_documents,
                "Uploader drained"
            );
        }

        match &self.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(self.metrics.clone()),
        }
    }

    /// Settle every request that has already finished, without waiting for
    /// the rest.
    ///
    /// `submit` does this on its own; call it to bring [`Self::metrics`] and
    /// the progress stream up to date while no documents are arriving.
    pub async fn collect_settled(&mut self) {
        while let Some(joined) = self.in_flight.try_join_next() {
            self.settle_joined(joined).await;
        }
    }

    /// Snapshot of the counters as of the last settled batch.
    pub fn metrics(&self) -> BulkMetrics {
        self.metrics.clone()
    }

    pub fn state(&self) -> UploaderState {
        self.state
    }

    /// Number of bulk requests currently outstanding.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of documents waiting for the next batch.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let previous = self.state;
        self.state = UploaderState::Flushing;
        let documents = std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.config.batch_size),
        );
        let batch = Batch::new(self.next_sequence, documents);
        self.next_sequence += 1;
        self.dispatch(batch);
        self.state = previous;
    }

    fn dispatch(&mut self, batch: Batch<D>) {
        let body = match serialize_batch(&self.config.index, &batch.documents) {
            Ok(body) => body,
            Err(e) => {
                let first = batch.documents.first().map(|d| d.document_id());
                self.error_log
                    .log_serialization_error(first, &e.to_string(), batch.len());
                self.metrics.unsent_documents += batch.len() as u64;
                return;
            }
        };

        debug!(
            sequence = batch.sequence,
            size = batch.len(),
            bytes = body.len(),
            in_flight = self.in_flight.len() + 1,
            "Dispatching batch"
        );

        let store = Arc::clone(&self.store);
        self.in_flight.spawn(async move {
            let started = Instant::now();
            let result = store.bulk_send(body).await;
            SettledBatch {
                batch,
                elapsed: started.elapsed(),
                result,
            }
        });
    }

    async fn wait_for_slot(&mut self) {
        while self.in_flight.len() >= self.config.concurrency {
            self.state = UploaderState::AwaitingSlot;
            if !self.settle_next().await {
                break;
            }
        }

        self.state = if self.failure.is_some() {
            UploaderState::Failed
        } else {
            UploaderState::Accepting
        };
    }

    /// Wait for whichever request finishes first. Returns false when none
    /// are outstanding.
    async fn settle_next(&mut self) -> bool {
        match self.in_flight.join_next().await {
            None => false,
            Some(joined) => {
                self.settle_joined(joined).await;
                true
            }
        }
    }

    async fn settle_joined(&mut self, joined: Result<SettledBatch<D>, JoinError>) {
        match joined {
            Ok(settled) => self.settle(settled).await,
            Err(join_error) => {
                let message = join_error.to_string();
                self.error_log.log_unknown_error("uploader", &message);
                self.latch(UploadError::TaskFailed(message));
            }
        }
    }

    // The only place where counters change for a dispatched batch.
    async fn settle(&mut self, settled: SettledBatch<D>) {
        let SettledBatch {
            batch,
            elapsed,
            result,
        } = settled;

        match result {
            Ok(response) => {
                let outcome = correlate(&batch.documents, &response);
                if !outcome.positional {
                    warn!(
                        sequence = batch.sequence,
                        submitted = batch.len(),
                        returned = response.items.len(),
                        "Bulk response does not line up with batch, failures left unattributed"
                    );
                }

                for failure in &outcome.failures {
                    self.error_log.log_insertion_error(
                        failure.document_id.as_deref(),
                        &failure.error_type,
                        &failure.reason,
                        batch.len(),
                    );
                }

                self.metrics
                    .record_batch(outcome.inserted, outcome.failed, elapsed);

                debug!(
                    sequence = batch.sequence,
                    inserted = outcome.inserted,
                    failed = outcome.failed,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Batch settled"
                );

                self.emit_progress(outcome.inserted).await;
            }
            Err(error) => {
                self.metrics.record_batch(0, batch.len() as u64, elapsed);
                let message = error.to_string();
                self.error_log
                    .log_connection_error("uploader", &message, Some(batch.len()));
                self.latch(UploadError::Transport {
                    sequence: batch.sequence,
                    message,
                });
            }
        }

        if self.error_log.len() >= self.config.error_flush_threshold {
            if let Err(e) = self.error_log.flush().await {
                warn!(error = %e, "Failed to flush error log");
            }
        }
    }

    async fn emit_progress(&mut self, inserted: u64) {
        let event = ProgressEvent {
            inserted,
            total: self.metrics.total_inserted,
            expected: self.config.expected_total,
        };

        let closed = match &self.progress {
            Some(sender) => sender.send(event).await.is_err(),
            None => false,
        };
        if closed {
            debug!("Progress receiver dropped, no further progress events");
            self.progress = None;
        }
    }

    fn latch(&mut self, failure: UploadError) {
        if self.failure.is_none() {
            warn!(error = %failure, "Uploader failure latched, refusing further documents");
            self.failure = Some(failure);
        }
        self.state = UploaderState::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BulkItem;
    use async_trait::async_trait;
    use serde::{Serialize, Serializer};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    #[derive(Debug, Clone, Serialize)]
    struct Doc {
        id: String,
    }

    impl BulkDocument for Doc {
        fn document_id(&self) -> &str {
            &self.id
        }
    }

    fn doc(i: usize) -> Doc {
        Doc {
            id: format!("doc-{}", i),
        }
    }

    /// Store that replays queued responses, acknowledging everything once
    /// the queue is empty. With a gate, each request waits for a permit.
    #[derive(Default)]
    struct ScriptedStore {
        responses: Mutex<VecDeque<Result<BulkResponse, StoreError>>>,
        gate: Option<Arc<Semaphore>>,
        calls: AtomicUsize,
    }

    impl ScriptedStore {
        fn with_responses(responses: Vec<Result<BulkResponse, StoreError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }

        fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl DocumentStore for ScriptedStore {
        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn bulk_send(&self, body: String) -> Result<BulkResponse, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            let scripted = self.responses.lock().unwrap().pop_front();
            match scripted {
                Some(response) => response,
                None => Ok(BulkResponse::acknowledged(body.lines().count() / 2)),
            }
        }
    }

    fn uploader(
        store: Arc<dyn DocumentStore>,
        batch_size: usize,
        concurrency: usize,
    ) -> (BatchUploader<Doc>, Arc<ErrorLog>) {
        let error_log = Arc::new(ErrorLog::in_memory());
        let config = UploaderConfig::new("events", batch_size, concurrency);
        (
            BatchUploader::new(config, store, Arc::clone(&error_log)),
            error_log,
        )
    }

    #[tokio::test]
    async fn test_two_records_one_batch() {
        let store = Arc::new(ScriptedStore::default());
        let (mut uploader, _log) = uploader(store.clone(), 2, 1);

        uploader.submit(doc(0)).await.unwrap();
        uploader.submit(doc(1)).await.unwrap();
        let metrics = uploader.drain().await.unwrap();

        assert_eq!(metrics.batches, 1);
        assert_eq!(metrics.total_inserted, 2);
        assert_eq!(metrics.failed_documents, 0);
        assert_eq!(uploader.metrics().total_inserted, 2);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(uploader.state(), UploaderState::Done);
    }

    #[tokio::test]
    async fn test_partial_failure_is_counted_and_attributed() {
        let store = Arc::new(ScriptedStore::with_responses(vec![Ok(BulkResponse {
            errors: true,
            items: vec![
                BulkItem::default(),
                BulkItem::failed("mapper_parsing_exception", "failed to parse [level]"),
            ],
        })]));
        let (progress_tx, mut progress_rx) = mpsc::channel(8);
        let (uploader, log) = uploader(store, 2, 1);
        let mut uploader = uploader.with_progress(progress_tx);

        uploader.submit(doc(0)).await.unwrap();
        uploader.submit(doc(1)).await.unwrap();
        let metrics = uploader.drain().await.unwrap();

        assert_eq!(metrics.total_inserted, 1);
        assert_eq!(metrics.failed_documents, 1);

        let event = progress_rx.recv().await.unwrap();
        assert_eq!(event.inserted, 1);
        assert_eq!(event.total, 1);

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].document_id.as_deref(), Some("doc-1"));
        assert_eq!(entries[0].error_type.as_deref(), Some("mapper_parsing_exception"));
    }

    #[tokio::test]
    async fn test_batch_count_is_ceiling_of_records_over_batch_size() {
        for (records, batch_size) in [(0usize, 3usize), (1, 3), (6, 3), (7, 3), (10, 1), (5, 100)] {
            let store = Arc::new(ScriptedStore::default());
            let (mut uploader, _log) = uploader(store.clone(), batch_size, 2);

            for i in 0..records {
                uploader.submit(doc(i)).await.unwrap();
            }
            let metrics = uploader.drain().await.unwrap();

            let expected = (records + batch_size - 1) / batch_size;
            assert_eq!(metrics.batches as usize, expected, "records={records} batch_size={batch_size}");
            assert_eq!(store.calls.load(Ordering::SeqCst), expected);
            assert_eq!(metrics.total_inserted as usize, records);
        }
    }

    #[tokio::test]
    async fn test_submit_blocks_when_slots_are_full() {
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(ScriptedStore::gated(Arc::clone(&gate)));
        let (mut uploader, _log) = uploader(store, 2, 2);
        let accepted = Arc::new(AtomicU64::new(0));

        let accepted_in_task = Arc::clone(&accepted);
        let producer = tokio::spawn(async move {
            for i in 0..10 {
                uploader.submit(doc(i)).await.unwrap();
                accepted_in_task.fetch_add(1, Ordering::SeqCst);
                assert!(uploader.in_flight() <= 2);
            }
            uploader.drain().await.unwrap()
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        // The fourth document fills the second batch and takes the last slot.
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
        assert!(!producer.is_finished());

        gate.add_permits(100);
        let metrics = producer.await.unwrap();
        assert_eq!(metrics.total_inserted, 10);
        assert_eq!(metrics.batches, 5);
    }

    #[tokio::test]
    async fn test_drain_waits_for_outstanding_requests() {
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(ScriptedStore::gated(Arc::clone(&gate)));
        let (mut uploader, _log) = uploader(store, 2, 4);

        for i in 0..3 {
            uploader.submit(doc(i)).await.unwrap();
        }
        assert_eq!(uploader.in_flight(), 1);
        assert_eq!(uploader.buffered(), 1);

        let drainer = tokio::spawn(async move {
            let first = uploader.drain().await.unwrap();
            let second = uploader.drain().await.unwrap();
            (first, second, uploader.submit(doc(99)).await)
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!drainer.is_finished());

        gate.add_permits(2);
        let (first, second, late_submit) = drainer.await.unwrap();
        assert_eq!(first.batches, 2);
        assert_eq!(first.total_inserted, 3);
        assert_eq!(first, second);
        assert_eq!(late_submit, Err(UploadError::Closed));
    }

    #[tokio::test]
    async fn test_transport_failure_latches() {
        let store = Arc::new(ScriptedStore::with_responses(vec![Err(
            StoreError::Unavailable("connection refused".to_string()),
        )]));
        let (mut uploader, log) = uploader(store, 2, 1);

        uploader.submit(doc(0)).await.unwrap();
        uploader.submit(doc(1)).await.unwrap();
        assert_eq!(uploader.state(), UploaderState::Failed);

        let rejected = uploader.submit(doc(2)).await;
        assert!(matches!(rejected, Err(UploadError::Transport { sequence: 0, .. })));
        assert_eq!(uploader.buffered(), 0);

        let drained = uploader.drain().await;
        assert!(matches!(drained, Err(UploadError::Transport { .. })));

        let metrics = uploader.metrics();
        assert_eq!(metrics.total_inserted, 0);
        assert_eq!(metrics.failed_documents, 2);
        assert_eq!(metrics.batches, 1);
        assert!(log
            .entries()
            .iter()
            .any(|e| e.kind == crate::error_log::ErrorKind::Connection));
    }

    #[tokio::test]
    async fn test_finished_batches_settle_on_next_submit() {
        let store = Arc::new(ScriptedStore::default());
        let (progress_tx, mut progress_rx) = mpsc::channel(16);
        let (uploader, _log) = uploader(store.clone(), 2, 4);
        let mut uploader = uploader.with_progress(progress_tx);

        for i in 0..4 {
            uploader.submit(doc(i)).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);

        uploader.submit(doc(4)).await.unwrap();
        let metrics = uploader.metrics();
        assert_eq!(metrics.batches, 2);
        assert_eq!(metrics.total_inserted, 4);
        assert_eq!(uploader.in_flight(), 0);

        let first = progress_rx.try_recv().unwrap();
        let second = progress_rx.try_recv().unwrap();
        assert_eq!(first.inserted + second.inserted, 4);
        assert_eq!(second.total, 4);

        let metrics = uploader.drain().await.unwrap();
        assert_eq!(metrics.batches, 3);
        assert_eq!(metrics.total_inserted, 5);
    }

    #[tokio::test]
    async fn test_collect_settled_refreshes_metrics_while_idle() {
        let store = Arc::new(ScriptedStore::default());
        let (mut uploader, _log) = uploader(store, 2, 4);

        for i in 0..4 {
            uploader.submit(doc(i)).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        uploader.collect_settled().await;
        assert_eq!(uploader.metrics().batches, 2);
        assert_eq!(uploader.metrics().total_inserted, 4);
        assert_eq!(uploader.state(), UploaderState::Accepting);
    }

    #[tokio::test]
    async fn test_settled_transport_failure_rejects_next_submit() {
        let store = Arc::new(ScriptedStore::with_responses(vec![Err(
            StoreError::Unavailable("connection refused".to_string()),
        )]));
        let (mut uploader, _log) = uploader(store.clone(), 1, 4);

        uploader.submit(doc(0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut accepted = 0;
        for i in 1..4 {
            if uploader.submit(doc(i)).await.is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 0);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(uploader.buffered(), 0);
        assert_eq!(uploader.state(), UploaderState::Failed);
        assert_eq!(uploader.metrics().failed_documents, 1);
        assert!(matches!(
            uploader.drain().await,
            Err(UploadError::Transport { sequence: 0, .. })
        ));
    }

    struct PanickingStore;

    #[async_trait]
    impl DocumentStore for PanickingStore {
        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn bulk_send(&self, _body: String) -> Result<BulkResponse, StoreError> {
            panic!("store client bug");
        }
    }

    #[tokio::test]
    async fn test_panicked_task_is_logged_as_unknown() {
        let (mut uploader, log) = uploader(Arc::new(PanickingStore), 1, 1);

        uploader.submit(doc(0)).await.unwrap();
        assert!(matches!(uploader.drain().await, Err(UploadError::TaskFailed(_))));
        assert!(log
            .entries()
            .iter()
            .any(|e| e.kind == crate::error_log::ErrorKind::Unknown));
    }

    #[tokio::test]
    async fn test_latched_failure_still_awaits_other_batches() {
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(ScriptedStore {
            responses: Mutex::new(
                vec![Err(StoreError::Unavailable("reset".to_string()))].into(),
            ),
            gate: Some(Arc::clone(&gate)),
            calls: AtomicUsize::new(0),
        });
        let (mut uploader, _log) = uploader(store, 1, 4);

        for i in 0..3 {
            uploader.submit(doc(i)).await.unwrap();
        }
        gate.add_permits(3);

        assert!(uploader.drain().await.is_err());
        let metrics = uploader.metrics();
        assert_eq!(metrics.batches, 3);
        assert_eq!(metrics.total_inserted + metrics.failed_documents, 3);
        assert_eq!(metrics.failed_documents, 1);
    }

    struct Unencodable {
        id: String,
    }

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cannot encode"))
        }
    }

    impl BulkDocument for Unencodable {
        fn document_id(&self) -> &str {
            &self.id
        }
    }

    #[tokio::test]
    async fn test_serialization_failure_skips_batch() {
        let store = Arc::new(ScriptedStore::default());
        let error_log = Arc::new(ErrorLog::in_memory());
        let mut uploader: BatchUploader<Unencodable> = BatchUploader::new(
            UploaderConfig::new("events", 2, 1),
            store.clone(),
            Arc::clone(&error_log),
        );

        for id in ["first", "second", "third"] {
            uploader
                .submit(Unencodable { id: id.to_string() })
                .await
                .unwrap();
        }
        let metrics = uploader.drain().await.unwrap();

        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(metrics.batches, 0);
        assert_eq!(metrics.unsent_documents, 3);

        let entries = error_log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, crate::error_log::ErrorKind::Serialization);
        assert_eq!(entries[0].document_id.as_deref(), Some("first"));
        assert_eq!(entries[1].document_id.as_deref(), Some("third"));
    }

    /// The batch holding `doc-0` is slow, the rest are fast, so batches
    /// settle out of dispatch order.
    struct SlowFirstStore;

    #[async_trait]
    impl DocumentStore for SlowFirstStore {
        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn bulk_send(&self, body: String) -> Result<BulkResponse, StoreError> {
            if body.contains("\"doc-0\"") {
                tokio::time::sleep(Duration::from_millis(40)).await;
            }
            Ok(BulkResponse::acknowledged(body.lines().count() / 2))
        }
    }

    #[tokio::test]
    async fn test_out_of_order_settlement_accumulates() {
        let store = Arc::new(SlowFirstStore);
        let (progress_tx, mut progress_rx) = mpsc::channel(16);
        let (uploader, _log) = uploader(store, 3, 3);
        let mut uploader = uploader.with_progress(progress_tx);

        for i in 0..8 {
            uploader.submit(doc(i)).await.unwrap();
        }
        let metrics = uploader.drain().await.unwrap();
        drop(uploader);

        assert_eq!(metrics.total_inserted, 8);

        let mut events = Vec::new();
        while let Some(event) = progress_rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        // The slow first batch of three lands last.
        assert_eq!(events.last().unwrap().inserted, 3);
        assert_eq!(events.last().unwrap().total, 8);
        assert!(events.windows(2).all(|w| w[0].total < w[1].total));
    }
}
