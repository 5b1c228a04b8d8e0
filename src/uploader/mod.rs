pub mod batch;
pub mod batch_uploader;
pub mod bulk;
pub mod metrics;

use serde::Serialize;

pub use batch::Batch;
pub use batch_uploader::{BatchUploader, UploadError, UploaderConfig, UploaderState};
pub use bulk::{correlate, serialize_batch, BatchOutcome, ItemFailure, SerializeError};
pub use metrics::BulkMetrics;

/// A document the uploader can ship.
///
/// The identity is only read when a rejected bulk item is attributed back to
/// its document for the error log.
pub trait BulkDocument: Serialize + Send + Sync + 'static {
    fn document_id(&self) -> &str;
}

impl BulkDocument for crate::record::EventRecord {
    fn document_id(&self) -> &str {
        &self.id
    }
}
