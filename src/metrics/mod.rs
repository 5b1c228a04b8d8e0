pub mod collector;

pub use collector::{MetricsCollector, MetricsSnapshot, NumericStats, NumericSummary};
