use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ErrorLogError {
    #[error("failed to write error log '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode error log entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure category of an [`ErrorLogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Insertion,
    Stream,
    Connection,
    Serialization,
    /// Anything that fits none of the other categories, such as a task
    /// that panicked.
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    pub kind: ErrorKind,
    /// Pipeline stage that observed the failure.
    pub stage: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

/// In-memory buffer of categorized failures, persisted as JSON lines.
///
/// Entries are appended from any stage and written out on [`ErrorLog::flush`],
/// which clears the buffer. Without a path, flushed entries are discarded.
#[derive(Debug)]
pub struct ErrorLog {
    run_id: Uuid,
    path: Option<PathBuf>,
    entries: Mutex<Vec<ErrorLogEntry>>,
}

impl ErrorLog {
    pub fn new(run_id: Uuid, path: Option<PathBuf>) -> Self {
        Self {
            run_id,
            path,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Error log that keeps entries in memory only.
    pub fn in_memory() -> Self {
        Self::new(Uuid::new_v4(), None)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A document was rejected by the store.
    pub fn log_insertion_error(
        &self,
        document_id: Option<&str>,
        error_type: &str,
        reason: &str,
        batch_size: usize,
    ) {
        tracing::warn!(
            document_id = document_id.unwrap_or("<unknown>"),
            error_type = %error_type,
            reason = %reason,
            "Document rejected by store"
        );
        self.push(ErrorLogEntry {
            document_id: document_id.map(str::to_string),
            batch_size: Some(batch_size),
            error_type: Some(error_type.to_string()),
            ..self.entry(ErrorKind::Insertion, "uploader", reason)
        });
    }

    /// A stage's own processing failed.
    pub fn log_stream_error(&self, stage: &str, message: &str) {
        tracing::error!(stage = %stage, error = %message, "Stream error");
        self.push(self.entry(ErrorKind::Stream, stage, message));
    }

    /// The transport call to the store failed.
    pub fn log_connection_error(&self, stage: &str, message: &str, batch_size: Option<usize>) {
        tracing::error!(stage = %stage, error = %message, "Connection error");
        self.push(ErrorLogEntry {
            batch_size,
            ..self.entry(ErrorKind::Connection, stage, message)
        });
    }

    /// A document could not be encoded for the wire.
    pub fn log_serialization_error(
        &self,
        document_id: Option<&str>,
        message: &str,
        batch_size: usize,
    ) {
        tracing::error!(
            document_id = document_id.unwrap_or("<unknown>"),
            error = %message,
            "Serialization error"
        );
        self.push(ErrorLogEntry {
            document_id: document_id.map(str::to_string),
            batch_size: Some(batch_size),
            ..self.entry(ErrorKind::Serialization, "uploader", message)
        });
    }

    /// A failure with no better category.
    pub fn log_unknown_error(&self, stage: &str, message: &str) {
        tracing::error!(stage = %stage, error = %message, "Unexpected error");
        self.push(self.entry(ErrorKind::Unknown, stage, message));
    }

    /// Number of entries waiting to be flushed.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the buffered entries.
    pub fn entries(&self) -> Vec<ErrorLogEntry> {
        self.lock().clone()
    }

    /// Append all buffered entries to the log file and clear the buffer.
    ///
    /// Returns the number of entries written. On a write failure the taken
    /// entries are put back so a later flush can retry them.
    pub async fn flush(&self) -> Result<usize, ErrorLogError> {
        let pending = std::mem::take(&mut *self.lock());
        if pending.is_empty() {
            return Ok(0);
        }

        let path = match &self.path {
            Some(path) => path,
            None => return Ok(pending.len()),
        };

        let mut body = String::new();
        for entry in &pending {
            body.push_str(&serde_json::to_string(entry)?);
            body.push('\n');
        }

        if let Err(source) = append(path, body.as_bytes()).await {
            let mut guard = self.lock();
            let newer = std::mem::replace(&mut *guard, pending);
            guard.extend(newer);
            return Err(ErrorLogError::Io {
                path: path.clone(),
                source,
            });
        }

        tracing::debug!(count = pending.len(), path = %path.display(), "Flushed error log");
        Ok(pending.len())
    }

    fn entry(&self, kind: ErrorKind, stage: &str, message: &str) -> ErrorLogEntry {
        ErrorLogEntry {
            timestamp: Utc::now(),
            run_id: self.run_id,
            kind,
            stage: stage.to_string(),
            message: message.to_string(),
            document_id: None,
            batch_size: None,
            error_type: None,
        }
    }

    fn push(&self, entry: ErrorLogEntry) {
        self.lock().push(entry);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ErrorLogEntry>> {
        // Entries stay valid even if a holder panicked mid-push.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn append(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await
}
