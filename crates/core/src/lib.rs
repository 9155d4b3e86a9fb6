//! imgforge
//!
//! Resumable batch image-conversion control plane: decides which files to
//! (re)process, which quality settings apply, retries transient failures
//! with backoff, and checkpoints run progress for crash-safe resume.

pub mod change;
pub mod checkpoint;
pub mod codec;
pub mod error_log;
pub mod orchestrator;
pub mod retry;
pub mod rules;
pub mod scan;
pub mod state;

pub use imgforge_config as config;
pub use imgforge_config::{Config, QualityRule, RecoveryConfig};

pub use change::should_process;
pub use checkpoint::{CheckpointError, CheckpointStore, LoadedState};
pub use codec::{Codec, EncodeRequest, EncodeTarget, MagickCodec};
pub use error_log::{ErrorLog, ErrorLogEntry};
pub use orchestrator::{Orchestrator, OrchestratorError, RunOptions, RunReport, RunStatus};
pub use retry::{run_with_retry, RetryOutcome, RetryPolicy, WorkError};
pub use rules::{resolve_quality, rule_matches, specificity, ImageMeta};
pub use scan::{is_image_file, scan_inputs, IMAGE_EXTENSIONS};
pub use state::{FileRecord, FileStatus, Progress, RunState, SCHEMA_VERSION};
