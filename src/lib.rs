pub mod cli;
pub mod config;
pub mod error_log;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod source;
pub mod store;
pub mod uploader;

pub use error_log::ErrorLog;
pub use pipeline::{run_ingestion, IngestOptions, IngestReport, PipelineError};
pub use store::{DocumentStore, HttpStore, MemoryStore};
