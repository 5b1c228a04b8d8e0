pub mod channel;
pub mod ingest;
pub mod runner;

pub use channel::{create_channel, Receiver, Sender};
pub use ingest::{run_ingestion, IngestOptions, IngestReport, PipelineError};
pub use runner::{run_collector, run_uploader};
