//! Run-state document model.
//!
//! One `RunState` exists per batch execution. It is created fresh (or loaded
//! from the checkpoint store in resume mode), mutated by the orchestrator
//! after each file, and persisted as a versioned JSON document. The progress
//! counters are maintained eagerly so the persisted invariant
//! `processed = succeeded + failed` and `remaining = total - processed`
//! holds at every checkpoint.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Schema version of the persisted run-state document. Documents carrying a
/// different version are never partially trusted.
pub const SCHEMA_VERSION: &str = "1.0";

/// Terminal status of one file within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// File was converted (or skipped as already up to date).
    Success,
    /// File failed after retries were exhausted or a non-retryable error.
    Failed,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::Success => write!(f, "success"),
            FileStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome record for one attempted file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Path to the input file.
    pub path: PathBuf,
    /// Terminal status.
    pub status: FileStatus,
    /// Error message when the file failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Output paths produced (or confirmed up to date) for this file.
    #[serde(default)]
    pub outputs: Vec<PathBuf>,
}

/// Progress counters for the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub total: u64,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub remaining: u64,
}

/// Per-file bookkeeping: attempted files and the ordered pending queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFiles {
    #[serde(default)]
    pub processed: Vec<FileRecord>,
    #[serde(default)]
    pub pending: Vec<PathBuf>,
}

/// Versioned run-state document, one per batch execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    /// Schema version of this document.
    pub schema_version: String,
    /// Unix timestamp (milliseconds) when the run began.
    pub started_at: i64,
    /// Unix timestamp (milliseconds) of the last mutation.
    pub last_updated_at: i64,
    /// Opaque snapshot of the settings active when the run began. Used for
    /// resume consistency, never re-validated.
    pub configuration: serde_json::Value,
    /// Progress counters.
    pub progress: Progress,
    /// Processed records and pending queue.
    pub files: RunFiles,
}

impl RunState {
    /// Create a fresh run state with the given candidate queue.
    pub fn new(configuration: serde_json::Value, pending: Vec<PathBuf>) -> Self {
        let now = current_timestamp_ms();
        let total = pending.len() as u64;
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            started_at: now,
            last_updated_at: now,
            configuration,
            progress: Progress {
                total,
                remaining: total,
                ..Progress::default()
            },
            files: RunFiles {
                processed: Vec::new(),
                pending,
            },
        }
    }

    /// Update the last_updated_at timestamp to now.
    pub fn touch(&mut self) {
        self.last_updated_at = current_timestamp_ms();
    }

    /// Record a successful (or skipped-as-up-to-date) file.
    pub fn record_success(&mut self, path: PathBuf, outputs: Vec<PathBuf>) {
        self.progress.succeeded += 1;
        self.record(FileRecord {
            path,
            status: FileStatus::Success,
            error: None,
            outputs,
        });
    }

    /// Record a terminal per-file failure.
    pub fn record_failure(&mut self, path: PathBuf, error: String) {
        self.progress.failed += 1;
        self.record(FileRecord {
            path,
            status: FileStatus::Failed,
            error: Some(error),
            outputs: Vec::new(),
        });
    }

    fn record(&mut self, record: FileRecord) {
        if let Some(pos) = self.files.pending.iter().position(|p| *p == record.path) {
            self.files.pending.remove(pos);
        }
        self.files.processed.push(record);
        self.sync_progress();
    }

    /// Recompute the derived counters from succeeded/failed and touch the
    /// update timestamp. Called after every mutation and before every save;
    /// never derived lazily from the file lists, which may have been
    /// filtered for resume.
    pub fn sync_progress(&mut self) {
        self.progress.processed = self.progress.succeeded + self.progress.failed;
        self.progress.remaining = self.progress.total.saturating_sub(self.progress.processed);
        self.touch();
    }

    /// Rebuild the candidate queue for a resumed run.
    ///
    /// Previously failed records are dropped from `processed` (their paths
    /// become candidates again) and the failed counter is reset; successful
    /// records are kept so their files are not redone.
    pub fn prepare_resume(&mut self, candidates: Vec<PathBuf>) {
        self.files
            .processed
            .retain(|record| record.status == FileStatus::Success);
        self.progress.failed = 0;
        self.progress.succeeded = self.files.processed.len() as u64;
        self.files.pending = candidates;
        self.progress.total =
            self.files.processed.len() as u64 + self.files.pending.len() as u64;
        self.sync_progress();
    }

    /// True when every candidate was attempted without an unrecovered failure.
    pub fn is_complete(&self) -> bool {
        self.files.pending.is_empty() && self.progress.failed == 0
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
pub(crate) fn current_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
