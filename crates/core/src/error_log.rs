//! Append-only error log.
//!
//! One structured JSONL record per failed attempt. The retry coordinator
//! produces `ErrorLogEntry` values; the orchestrator owns the writer and
//! appends them.

use crate::retry::WorkError;
use crate::state::current_timestamp_ms;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// The failure payload of a log record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggedError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Where in the pipeline the attempt failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptContext {
    pub attempt: u32,
    pub operation: String,
}

/// One record per failed attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLogEntry {
    /// Unix timestamp (milliseconds) of the failure.
    pub timestamp: i64,
    /// Input file the attempt was for.
    pub file: PathBuf,
    pub error: LoggedError,
    pub context: AttemptContext,
}

impl ErrorLogEntry {
    /// Build a record for one failed attempt.
    pub fn new(file: &Path, error: &WorkError, attempt: u32, operation: &str) -> Self {
        Self {
            timestamp: current_timestamp_ms(),
            file: file.to_path_buf(),
            error: LoggedError {
                message: error.message.clone(),
                code: error.code.clone(),
            },
            context: AttemptContext {
                attempt,
                operation: operation.to_string(),
            },
        }
    }
}

/// Append-only JSONL writer for failure records.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single JSON line, creating the file (and its
    /// parent directory) on first use.
    pub fn append(&self, entry: &ErrorLogEntry) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let line = serde_json::to_string(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}
