use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub errors: ErrorLogConfig,
}

/// Connection to the bulk document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            index: default_index(),
            timeout: default_timeout(),
            username: None,
            password: None,
        }
    }
}

fn default_store_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_index() -> String {
    "events".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_total_records")]
    pub total_records: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Records generated between scheduler yields.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Capacity of each inter-stage channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            total_records: default_total_records(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            chunk_size: default_chunk_size(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_total_records() -> u64 {
    100_000
}

fn default_batch_size() -> usize {
    1000
}

fn default_concurrency() -> usize {
    1
}

fn default_chunk_size() -> usize {
    100
}

fn default_channel_capacity() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_progress_interval", with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            interval: default_progress_interval(),
        }
    }
}

fn default_progress_interval() -> Duration {
    Duration::from_secs(2)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogConfig {
    /// JSON-lines file that failed records are appended to.
    #[serde(default = "default_error_path")]
    pub path: PathBuf,
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
}

impl Default for ErrorLogConfig {
    fn default() -> Self {
        Self {
            path: default_error_path(),
            flush_threshold: default_flush_threshold(),
        }
    }
}

fn default_error_path() -> PathBuf {
    PathBuf::from("ingest-errors.jsonl")
}

fn default_flush_threshold() -> usize {
    1000
}
