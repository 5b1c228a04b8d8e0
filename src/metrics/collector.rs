use crate::record::{Category, Environment, EventRecord, Level};
use serde::Serialize;
use std::collections::BTreeMap;

/// Running sum/min/max of one numeric field.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericStats {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl NumericStats {
    pub fn observe(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn summary(&self) -> NumericSummary {
        let avg = if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        };
        NumericSummary {
            min: self.min,
            max: self.max,
            avg,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Aggregates over every record that passed through the collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_records: u64,
    pub error_count: u64,
    pub levels: BTreeMap<Level, u64>,
    pub services: BTreeMap<String, u64>,
    pub environments: BTreeMap<Environment, u64>,
    pub categories: BTreeMap<Category, u64>,
    pub response_time_ms: NumericSummary,
    pub cpu_usage: NumericSummary,
    pub memory_usage_mb: NumericSummary,
    pub p95_response_time_ms: f64,
    /// Keyed by `country|city`.
    pub geo: BTreeMap<String, u64>,
    pub tags: BTreeMap<String, u64>,
}

/// Pass-through observer that keeps aggregate statistics.
///
/// Every response time is retained so the 95th percentile can be computed
/// exactly once the stream has ended.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    total_records: u64,
    error_count: u64,
    levels: BTreeMap<Level, u64>,
    services: BTreeMap<String, u64>,
    environments: BTreeMap<Environment, u64>,
    categories: BTreeMap<Category, u64>,
    response_time: NumericStats,
    cpu: NumericStats,
    memory: NumericStats,
    response_times: Vec<f64>,
    geo: BTreeMap<String, u64>,
    tags: BTreeMap<String, u64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, record: &EventRecord) {
        self.total_records += 1;
        if record.error.is_some() {
            self.error_count += 1;
        }

        *self.levels.entry(record.level).or_default() += 1;
        *self.environments.entry(record.service.environment).or_default() += 1;
        *self.categories.entry(record.category).or_default() += 1;
        bump(&mut self.services, &record.service.name);

        let response_time = record.metrics.response_time_ms;
        self.response_time.observe(response_time);
        self.response_times.push(response_time);
        self.cpu.observe(record.metrics.cpu_usage);
        self.memory.observe(record.metrics.memory_usage_mb);

        *self.geo.entry(record.geo.key()).or_default() += 1;
        for tag in &record.tags {
            bump(&mut self.tags, tag);
        }
    }

    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    /// Current aggregates.
    ///
    /// Sorts a copy of every retained response time, so call it at the end
    /// of a run rather than per record.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut sorted = self.response_times.clone();
        self.build_snapshot(&mut sorted)
    }

    /// Final aggregates, consuming the collector and its retained samples.
    pub fn finish(mut self) -> MetricsSnapshot {
        let mut samples = std::mem::take(&mut self.response_times);
        self.build_snapshot(&mut samples)
    }

    fn build_snapshot(&self, samples: &mut [f64]) -> MetricsSnapshot {
        MetricsSnapshot {
            total_records: self.total_records,
            error_count: self.error_count,
            levels: self.levels.clone(),
            services: self.services.clone(),
            environments: self.environments.clone(),
            categories: self.categories.clone(),
            response_time_ms: self.response_time.summary(),
            cpu_usage: self.cpu.summary(),
            memory_usage_mb: self.memory.summary(),
            p95_response_time_ms: percentile_95(samples),
            geo: self.geo.clone(),
            tags: self.tags.clone(),
        }
    }
}

fn bump(counts: &mut BTreeMap<String, u64>, key: &str) {
    match counts.get_mut(key) {
        Some(count) => *count += 1,
        None => {
            counts.insert(key.to_string(), 1);
        }
    }
}

/// Value at index `floor(n * 0.95)` of the ascending samples, clamped to
/// the last one. Zero for no samples.
fn percentile_95(samples: &mut [f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.sort_by(|a, b| a.total_cmp(b));
    let index = ((samples.len() as f64 * 0.95).floor() as usize).min(samples.len() - 1);
    samples[index]
}
