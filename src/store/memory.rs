use super::{BulkResponse, DocumentStore, StoreError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Store that acknowledges every document without keeping it.
///
/// Useful for dry runs that measure the pipeline itself and for tests that
/// only care about accounting.
#[derive(Debug, Default)]
pub struct MemoryStore {
    requests: AtomicU64,
    documents: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn documents(&self) -> u64 {
        self.documents.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn bulk_send(&self, body: String) -> Result<BulkResponse, StoreError> {
        let lines = body.lines().filter(|line| !line.is_empty()).count();
        if lines % 2 != 0 {
            return Err(StoreError::InvalidResponse(format!(
                "bulk body has an odd number of lines ({})",
                lines
            )));
        }

        let count = lines / 2;
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.documents.fetch_add(count as u64, Ordering::Relaxed);
        Ok(BulkResponse::acknowledged(count))
    }
}
