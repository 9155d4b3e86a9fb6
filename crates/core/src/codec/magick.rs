//! ImageMagick codec implementation.
//!
//! Builds and executes `magick` commands for probing dimensions and
//! converting one input into its target formats. Commands run on the
//! blocking thread pool so the orchestrator loop stays responsive.

use super::{Codec, EncodeRequest, EncodeTarget};
use crate::retry::WorkError;
use crate::rules::ImageMeta;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Build a `magick` conversion command for one target.
///
/// `magick <input> -quality <q> <output>`; the output format is inferred
/// by ImageMagick from the destination extension.
pub fn build_convert_command(input: &Path, target: &EncodeTarget) -> Command {
    let mut cmd = Command::new("magick");
    cmd.arg(input);
    cmd.arg("-quality").arg(target.quality.to_string());
    cmd.arg(&target.path);
    cmd
}

/// Build a `magick identify` command printing `<width> <height>`.
pub fn build_identify_command(input: &Path) -> Command {
    let mut cmd = Command::new("magick");
    cmd.arg("identify");
    cmd.arg("-format").arg("%w %h");
    cmd.arg(input);
    cmd
}

fn parse_dimensions(output: &str) -> Option<ImageMeta> {
    let mut parts = output.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    Some(ImageMeta { width, height })
}

/// Map an I/O failure to a work error, preserving the errno-style code when
/// the OS supplies one the retry classifier understands.
fn io_work_error(context: &str, e: std::io::Error) -> WorkError {
    let message = format!("{}: {}", context, e);
    match e.kind() {
        std::io::ErrorKind::TimedOut => WorkError::with_code(message, "ETIMEDOUT"),
        std::io::ErrorKind::ConnectionReset => WorkError::with_code(message, "ECONNRESET"),
        std::io::ErrorKind::WouldBlock => WorkError::with_code(message, "EAGAIN"),
        _ => WorkError::new(message),
    }
}

fn run_convert(input: &PathBuf, target: &EncodeTarget) -> Result<(), WorkError> {
    if let Some(parent) = target.path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| io_work_error("failed to create output directory", e))?;
    }

    let output = build_convert_command(input, target)
        .output()
        .map_err(|e| io_work_error("failed to run magick", e))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(WorkError::new(format!(
            "magick failed for {}: {}",
            target.path.display(),
            stderr.trim()
        )))
    }
}

/// Codec backed by the `magick` command-line tool.
#[derive(Debug, Clone, Default)]
pub struct MagickCodec;

#[async_trait]
impl Codec for MagickCodec {
    async fn probe(&self, path: &Path) -> Result<Option<ImageMeta>, WorkError> {
        let input = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || {
            build_identify_command(&input).output()
        })
        .await
        .map_err(|e| WorkError::new(format!("probe task panicked: {}", e)))?;

        match result {
            Ok(output) if output.status.success() => {
                Ok(parse_dimensions(&String::from_utf8_lossy(&output.stdout)))
            }
            Ok(output) => {
                tracing::debug!(
                    path = %path.display(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "identify failed, proceeding without metadata"
                );
                Ok(None)
            }
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %e,
                    "identify unavailable, proceeding without metadata"
                );
                Ok(None)
            }
        }
    }

    async fn encode(&self, request: &EncodeRequest) -> Result<(), WorkError> {
        let request = request.clone();
        tokio::task::spawn_blocking(move || {
            for target in &request.targets {
                run_convert(&request.input, target)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| WorkError::new(format!("encode task panicked: {}", e)))?
    }
}
