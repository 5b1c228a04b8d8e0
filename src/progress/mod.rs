pub mod reporter;

pub use reporter::{run_reporter, ProgressLine, ProgressReporter};

/// Emitted by the uploader each time a batch settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Documents the settled batch inserted.
    pub inserted: u64,
    /// Documents inserted so far in the run.
    pub total: u64,
    /// Documents the run is expected to produce.
    pub expected: u64,
}
