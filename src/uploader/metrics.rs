use serde::Serialize;
use std::time::Duration;

/// Cumulative upload counters for one pipeline run.
///
/// Only the uploader's settlement step mutates these; everyone else gets a
/// copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkMetrics {
    /// Batches that settled, successfully or not.
    pub batches: u64,
    pub total_inserted: u64,
    pub failed_documents: u64,
    /// Documents in batches that could not be serialized and were never sent.
    pub unsent_documents: u64,
    #[serde(with = "humantime_serde")]
    pub total_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub max_duration: Duration,
}

impl BulkMetrics {
    pub(crate) fn record_batch(&mut self, inserted: u64, failed: u64, elapsed: Duration) {
        self.batches += 1;
        self.total_inserted += inserted;
        self.failed_documents += failed;
        self.total_duration += elapsed;
        if elapsed > self.max_duration {
            self.max_duration = elapsed;
        }
    }

    pub fn average_duration(&self) -> Duration {
        if self.batches == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_duration.as_nanos() / u128::from(self.batches);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}
