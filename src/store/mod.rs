pub mod http;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned error status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid bulk response: {0}")]
    InvalidResponse(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result of one bulk request.
///
/// `items[i]` describes the i-th document of the submitted body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResponse {
    /// Set when at least one item failed.
    pub errors: bool,
    pub items: Vec<BulkItem>,
}

impl BulkResponse {
    /// Response acknowledging `count` documents.
    pub fn acknowledged(count: usize) -> Self {
        Self {
            errors: false,
            items: vec![BulkItem::default(); count],
        }
    }

    pub fn failed_items(&self) -> usize {
        self.items.iter().filter(|item| item.error.is_some()).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkItem {
    pub error: Option<BulkItemError>,
}

impl BulkItem {
    pub fn failed(error_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            error: Some(BulkItemError {
                error_type: error_type.into(),
                reason: reason.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemError {
    pub error_type: String,
    pub reason: String,
}

/// The document store as seen by the pipeline.
///
/// Only reachability and bulk writes are needed; index administration and
/// querying live elsewhere.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Check that the store answers at all.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Submit a serialized bulk body.
    ///
    /// An `Err` means the request itself failed and nothing about the
    /// individual documents is known.
    async fn bulk_send(&self, body: String) -> Result<BulkResponse, StoreError>;
}
