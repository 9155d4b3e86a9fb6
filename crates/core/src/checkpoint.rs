//! Checkpoint store for the run-state document.
//!
//! Saves go through a write-to-temporary-file-then-atomic-rename sequence so
//! a reader never observes a half-written document, even if the process is
//! killed mid-write. Loads gate on the schema version: a document with an
//! unrecognized (or unreadable) schema is warned about and treated as if no
//! state existed, never partially trusted.

use crate::state::{RunState, SCHEMA_VERSION};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for checkpoint operations. These are run-level infrastructure
/// failures; per-document problems (wrong version, truncation) are reported
/// through `LoadedState` instead.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Failed to write or promote the state document
    #[error("Failed to write run state: {0}")]
    Write(#[source] io::Error),

    /// Failed to read an existing state document
    #[error("Failed to read run state: {0}")]
    Read(#[source] io::Error),

    /// Failed to serialize the run state
    #[error("Failed to serialize run state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result of loading persisted state, as an explicit tagged union so callers
/// cannot accidentally treat an incompatible document as usable.
#[derive(Debug, PartialEq)]
pub enum LoadedState {
    /// No state document exists.
    Absent,
    /// A document exists but cannot be trusted (version mismatch, truncated,
    /// or otherwise unreadable). `found` describes what was on disk.
    Incompatible { found: String },
    /// A valid document matching the running schema version.
    Usable(RunState),
}

/// Persists and restores the run-state document at a fixed path.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Path of the state document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the temporary file used during save.
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.as_os_str().to_owned();
        temp.push(".tmp");
        PathBuf::from(temp)
    }

    /// Serialize the state and persist it atomically.
    ///
    /// The document is written to `<path>.tmp` first and renamed over the
    /// final path, so a crash at any point leaves either the previous valid
    /// document or the new one, never a truncated mix.
    pub fn save(&self, state: &RunState) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(CheckpointError::Write)?;
            }
        }

        let json = serde_json::to_string_pretty(state)?;
        let temp = self.temp_path();
        fs::write(&temp, json).map_err(CheckpointError::Write)?;
        fs::rename(&temp, &self.path).map_err(CheckpointError::Write)
    }

    /// Load the persisted state, if any.
    ///
    /// Documents with a schema version other than the running one, and
    /// documents that cannot be parsed at all, are logged and reported as
    /// `Incompatible` rather than migrated or partially trusted.
    pub fn load(&self) -> Result<LoadedState, CheckpointError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LoadedState::Absent),
            Err(e) => return Err(CheckpointError::Read(e)),
        };

        let document: serde_json::Value = match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "run state is not valid JSON, ignoring it"
                );
                return Ok(LoadedState::Incompatible {
                    found: "unreadable".to_string(),
                });
            }
        };

        let found = document
            .get("schemaVersion")
            .and_then(|v| v.as_str())
            .unwrap_or("missing")
            .to_string();

        if found != SCHEMA_VERSION {
            tracing::warn!(
                path = %self.path.display(),
                found = %found,
                expected = SCHEMA_VERSION,
                "run state has an unrecognized schema version, ignoring it"
            );
            return Ok(LoadedState::Incompatible { found });
        }

        match serde_json::from_value::<RunState>(document) {
            Ok(state) => Ok(LoadedState::Usable(state)),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "run state does not match the expected document shape, ignoring it"
                );
                Ok(LoadedState::Incompatible { found })
            }
        }
    }

    /// Best-effort delete of the state document (and any stale temp file).
    /// A missing file is not an error.
    pub fn clear(&self) -> Result<(), CheckpointError> {
        let _ = fs::remove_file(self.temp_path());
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CheckpointError::Write(e)),
        }
    }
}
