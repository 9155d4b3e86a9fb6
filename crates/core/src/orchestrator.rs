//! Batch orchestrator.
//!
//! Top-level state machine for one run: enumerate candidates, consult the
//! change detector and quality rules per file, delegate the actual encode
//! through the retry coordinator, checkpoint progress at a fixed cadence,
//! and aggregate a final report. Processing is single-threaded and
//! sequential; resumability substitutes for cancellation.

use crate::change::should_process;
use crate::checkpoint::{CheckpointError, CheckpointStore, LoadedState};
use crate::codec::{Codec, EncodeRequest, EncodeTarget};
use crate::error_log::ErrorLog;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::rules::resolve_quality;
use crate::scan::scan_inputs;
use crate::state::{FileStatus, RunState};
use imgforge_config::{Config, QualityRule};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Quality applied when a target format has no configured value.
const DEFAULT_QUALITY: u8 = 80;

/// Error type for run-level failures. Per-file failures never surface here;
/// they are folded into the run state and the final report.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Checkpoint store failure
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Error log is unwritable
    #[error("Failed to append to error log: {0}")]
    ErrorLog(#[source] std::io::Error),
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every candidate was attempted with zero unrecovered failures.
    Complete,
    /// The run reached the end but some files failed (continue-on-error).
    Partial,
    /// A terminal failure stopped the run early.
    Aborted,
}

impl RunStatus {
    /// Process exit code for this status. Partial is only reachable with
    /// continue-on-error set, so it counts as tolerated success.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunStatus::Complete | RunStatus::Partial => 0,
            RunStatus::Aborted => 1,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Complete => write!(f, "complete"),
            RunStatus::Partial => write!(f, "partial"),
            RunStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// Aggregate report for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub status: RunStatus,
    pub total: u64,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Files recorded as success without an encode attempt.
    pub skipped: u64,
    /// Set when failures occurred, pointing at the error log.
    pub error_log: Option<PathBuf>,
}

impl RunReport {
    /// Human-readable end-of-run summary.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Run {}: {} processed ({} skipped), {} failed of {} total",
            self.status, self.processed, self.skipped, self.failed, self.total
        );
        if let Some(log) = &self.error_log {
            summary.push_str(&format!("\nFailures logged to {}", log.display()));
            summary.push_str("\nRe-run with --resume to retry failed and pending files");
        }
        summary
    }
}

/// Options controlling one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory enumerated for candidate inputs.
    pub input_root: PathBuf,
    /// Root under which outputs are mirrored.
    pub output_root: PathBuf,
    /// Disable change detection and reprocess everything.
    pub force: bool,
    /// Resume from the persisted run state if one is usable.
    pub resume: bool,
    /// Keep going after a terminal per-file failure.
    pub continue_on_error: bool,
    /// Checkpoint after this many files (and once at the very end).
    pub checkpoint_interval: usize,
    /// Retry knobs for the encode step.
    pub retry: RetryPolicy,
}

impl RunOptions {
    pub fn new<P: Into<PathBuf>>(input_root: P, output_root: P) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            force: false,
            resume: false,
            continue_on_error: false,
            checkpoint_interval: 10,
            retry: RetryPolicy::default(),
        }
    }
}

/// Orchestrates one batch run end to end.
pub struct Orchestrator {
    options: RunOptions,
    rules: Vec<QualityRule>,
    default_quality: BTreeMap<String, u8>,
    formats: Vec<String>,
    configuration: serde_json::Value,
    codec: Arc<dyn Codec>,
    store: CheckpointStore,
    error_log: ErrorLog,
}

impl Orchestrator {
    /// Wire up an orchestrator from already-validated configuration.
    pub fn new(
        options: RunOptions,
        config: &Config,
        codec: Arc<dyn Codec>,
        store: CheckpointStore,
        error_log: ErrorLog,
    ) -> Self {
        let configuration =
            serde_json::to_value(config).unwrap_or(serde_json::Value::Null);
        Self {
            options,
            rules: config.rules.clone(),
            default_quality: config.quality.defaults.clone(),
            formats: config.output.formats.clone(),
            configuration,
            codec,
            store,
            error_log,
        }
    }

    /// Execute the run to a terminal state.
    pub async fn run(&self) -> Result<RunReport, OrchestratorError> {
        let enumerated = scan_inputs(&self.options.input_root);
        let mut state = self.init_state(enumerated)?;

        tracing::info!(
            total = state.progress.total,
            pending = state.files.pending.len(),
            "starting run"
        );

        let candidates = state.files.pending.clone();
        let mut skipped = 0u64;
        let mut since_checkpoint = 0usize;
        let mut aborted = false;

        for path in candidates {
            let meta = match self.codec.probe(&path).await {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "probe failed");
                    None
                }
            };

            let quality =
                resolve_quality(&path, meta.as_ref(), &self.default_quality, &self.rules);
            let targets = self.targets_for(&path, &quality);
            let outputs: Vec<PathBuf> = targets.iter().map(|t| t.path.clone()).collect();

            if !should_process(&path, &outputs, self.options.force) {
                tracing::debug!(file = %path.display(), "outputs up to date, skipping");
                skipped += 1;
                state.record_success(path.clone(), outputs);
            } else {
                let request = EncodeRequest {
                    input: path.clone(),
                    targets,
                };
                let codec = Arc::clone(&self.codec);
                let outcome = run_with_retry(&self.options.retry, &path, "encode", move || {
                    let codec = Arc::clone(&codec);
                    let request = request.clone();
                    async move { codec.encode(&request).await }
                })
                .await;

                for entry in &outcome.failures {
                    self.error_log
                        .append(entry)
                        .map_err(OrchestratorError::ErrorLog)?;
                }

                match outcome.result {
                    Ok(()) => {
                        tracing::info!(
                            file = %path.display(),
                            attempts = outcome.attempts,
                            "converted"
                        );
                        state.record_success(path.clone(), outputs);
                    }
                    Err(error) => {
                        tracing::error!(
                            file = %path.display(),
                            error = %error,
                            attempts = outcome.attempts,
                            "giving up on file"
                        );
                        state.record_failure(path.clone(), error.to_string());
                        if !self.options.continue_on_error {
                            aborted = true;
                        }
                    }
                }
            }

            if aborted {
                break;
            }

            since_checkpoint += 1;
            if since_checkpoint >= self.options.checkpoint_interval.max(1) {
                state.sync_progress();
                self.store.save(&state)?;
                since_checkpoint = 0;
            }
        }

        state.sync_progress();
        self.store.save(&state)?;

        let status = if aborted {
            RunStatus::Aborted
        } else if state.progress.failed == 0 {
            self.store.clear()?;
            RunStatus::Complete
        } else {
            RunStatus::Partial
        };

        tracing::info!(
            status = %status,
            succeeded = state.progress.succeeded,
            failed = state.progress.failed,
            skipped,
            "run finished"
        );

        Ok(RunReport {
            status,
            total: state.progress.total,
            processed: state.progress.processed,
            succeeded: state.progress.succeeded,
            failed: state.progress.failed,
            skipped,
            error_log: if state.progress.failed > 0 {
                Some(self.error_log.path().to_path_buf())
            } else {
                None
            },
        })
    }

    /// Build the run state: fresh, or rebuilt from a usable saved document.
    ///
    /// Resume candidates are the saved pending files (saved order), then
    /// previously failed files, then newly discovered files not already
    /// attempted. Successful records are kept so their files are not redone.
    fn init_state(&self, enumerated: Vec<PathBuf>) -> Result<RunState, OrchestratorError> {
        if self.options.resume {
            match self.store.load()? {
                LoadedState::Usable(mut state) => {
                    let mut seen: HashSet<PathBuf> = HashSet::new();
                    let mut candidates: Vec<PathBuf> = Vec::new();

                    for path in &state.files.pending {
                        if seen.insert(path.clone()) {
                            candidates.push(path.clone());
                        }
                    }
                    for record in &state.files.processed {
                        if record.status == FileStatus::Failed && seen.insert(record.path.clone())
                        {
                            candidates.push(record.path.clone());
                        }
                    }

                    let attempted: HashSet<&PathBuf> =
                        state.files.processed.iter().map(|r| &r.path).collect();
                    for path in enumerated {
                        if !attempted.contains(&path) && seen.insert(path.clone()) {
                            candidates.push(path);
                        }
                    }

                    tracing::info!(
                        candidates = candidates.len(),
                        already_succeeded = state
                            .files
                            .processed
                            .iter()
                            .filter(|r| r.status == FileStatus::Success)
                            .count(),
                        "resuming from saved run state"
                    );
                    state.prepare_resume(candidates);
                    return Ok(state);
                }
                LoadedState::Incompatible { found } => {
                    tracing::warn!(found = %found, "saved run state is unusable, starting fresh");
                }
                LoadedState::Absent => {
                    tracing::info!("no saved run state, starting fresh");
                }
            }
        }

        Ok(RunState::new(self.configuration.clone(), enumerated))
    }

    /// One encode target per configured output format, mirrored under the
    /// output root with the format as extension.
    fn targets_for(&self, input: &Path, quality: &BTreeMap<String, u8>) -> Vec<EncodeTarget> {
        let relative = input
            .strip_prefix(&self.options.input_root)
            .unwrap_or(input);

        self.formats
            .iter()
            .map(|format| EncodeTarget {
                format: format.clone(),
                path: self.options.output_root.join(relative).with_extension(format),
                quality: quality.get(format).copied().unwrap_or(DEFAULT_QUALITY),
            })
            .collect()
    }
}
