//! CLI entry point for imgforge
//!
//! Parses command line arguments, loads configuration, and drives one batch
//! run to a terminal state.

use clap::Parser;
use imgforge::checkpoint::CheckpointStore;
use imgforge::codec::MagickCodec;
use imgforge::error_log::ErrorLog;
use imgforge::retry::RetryPolicy;
use imgforge::{Orchestrator, RunOptions};
use imgforge_config::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// imgforge - Resumable batch image conversion
#[derive(Parser, Debug)]
#[command(name = "imgforge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory to scan for input images
    input: PathBuf,

    /// Directory outputs are mirrored under
    #[arg(short, long, default_value = "converted")]
    output: PathBuf,

    /// Path to the configuration file (imgforge.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reprocess every file, ignoring timestamps
    #[arg(long, default_value = "false")]
    force: bool,

    /// Resume from the saved run state if one is usable
    #[arg(long, default_value = "false")]
    resume: bool,

    /// Keep processing remaining files after a terminal per-file failure
    #[arg(long, default_value = "false")]
    continue_on_error: bool,

    /// Maximum attempts per file (overrides configuration)
    #[arg(long)]
    max_retries: Option<u32>,

    /// Base delay between attempts in milliseconds (overrides configuration)
    #[arg(long)]
    retry_delay: Option<u64>,

    /// Path of the run-state document
    #[arg(long, default_value = ".imgforge/run-state.json")]
    state_file: PathBuf,

    /// Path of the append-only failure log
    #[arg(long, default_value = ".imgforge/errors.log")]
    error_log: PathBuf,
}

impl Args {
    /// Fold CLI overrides into the loaded configuration. Flags are additive:
    /// a flag left at its default never unsets a configured value.
    fn apply_to(&self, config: &mut Config) {
        if let Some(max_retries) = self.max_retries {
            config.recovery.max_retries = max_retries;
        }
        if let Some(retry_delay) = self.retry_delay {
            config.recovery.retry_delay_ms = retry_delay;
        }
        if self.continue_on_error {
            config.recovery.continue_on_error = true;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load configuration from {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };
    args.apply_to(&mut config);

    let mut options = RunOptions::new(args.input.clone(), args.output.clone());
    options.force = args.force;
    options.resume = args.resume;
    options.continue_on_error = config.recovery.continue_on_error;
    options.retry = RetryPolicy {
        max_attempts: config.recovery.max_retries,
        base_delay: Duration::from_millis(config.recovery.retry_delay_ms),
        exponential_backoff: config.recovery.exponential_backoff,
    };

    let orchestrator = Orchestrator::new(
        options,
        &config,
        Arc::new(MagickCodec),
        CheckpointStore::new(&args.state_file),
        ErrorLog::new(&args.error_log),
    );

    match orchestrator.run().await {
        Ok(report) => {
            println!("{}", report.summary());
            ExitCode::from(report.status.exit_code())
        }
        Err(e) => {
            eprintln!("Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
