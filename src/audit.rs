//! Append-only audit log of delivery attempts.
//!
//! One record is appended per attempt, not only at terminal outcomes, so the
//! file carries the full retry history of every request. Records are JSON
//! lines; `append` does not return until the record is on stable storage.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::request::RequestId;

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Sent,
    Failed,
}

/// One audit entry. Never mutated or deleted after `append`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub request_id: RequestId,
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub timestamp: DateTime<Utc>,
    pub status: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    /// Record for a successful attempt.
    pub fn sent(
        request_id: RequestId,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            sender: sender.into(),
            recipient: recipient.into(),
            subject: subject.into(),
            timestamp: Utc::now(),
            status: AttemptOutcome::Sent,
            error: None,
        }
    }

    /// Record for a failed attempt, carrying the error text.
    pub fn failed(
        request_id: RequestId,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            sender: sender.into(),
            recipient: recipient.into(),
            subject: subject.into(),
            timestamp: Utc::now(),
            status: AttemptOutcome::Failed,
            error: Some(error.into()),
        }
    }
}

/// Durable append-only sink backed by a JSON-lines file.
///
/// The read queries exist for external reporting collaborators; the dispatch
/// pipeline itself only appends.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLog {
    /// Open (creating if absent) the audit file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| RelayError::Configuration(format!("audit log {}: {e}", path.display())))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Open the audit log wrapped in an Arc for sharing.
    pub fn shared(path: impl AsRef<Path>) -> Result<Arc<Self>, RelayError> {
        Ok(Arc::new(Self::open(path)?))
    }

    /// Append one record and flush it to stable storage before returning,
    /// so a crash immediately after cannot lose the outcome.
    pub fn append(&self, record: &AuditRecord) -> Result<(), RelayError> {
        let line = serde_json::to_string(record)
            .map_err(|e| RelayError::Internal(format!("audit record serialization: {e}")))?;

        let mut file = self.file.lock();
        writeln!(file, "{line}").map_err(|e| self.io_error(e))?;
        file.flush().map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        Ok(())
    }

    /// All records in append order.
    pub fn read_all(&self) -> Result<Vec<AuditRecord>, RelayError> {
        // Hold the lock so a concurrent append cannot leave a torn last line.
        let _guard = self.file.lock();
        let file = File::open(&self.path).map_err(|e| self.io_error(e))?;

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| self.io_error(e))?;
            if line.is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line)
                .map_err(|e| RelayError::Internal(format!("corrupt audit record: {e}")))?;
            records.push(record);
        }
        Ok(records)
    }

    /// The most recent `n` records, oldest of those first.
    pub fn read_last(&self, n: usize) -> Result<Vec<AuditRecord>, RelayError> {
        let mut records = self.read_all()?;
        let skip = records.len().saturating_sub(n);
        Ok(records.split_off(skip))
    }

    fn io_error(&self, e: std::io::Error) -> RelayError {
        RelayError::Internal(format!("audit log {}: {e}", self.path.display()))
    }
}
