//! Change detection module for skipping already-converted inputs.
//!
//! Before processing a file, we compare the input's modification time against
//! every expected output. Any uncertainty (missing output, stale output,
//! vanished metadata) defaults to reprocessing rather than risking a stale
//! artifact. The one exception is a vanished input: nothing to do is not an
//! error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Decide whether a single output is stale relative to the input.
///
/// `None` means the output is missing or its metadata is unreadable, which
/// always counts as stale. An output with the same modification time as the
/// input counts as up to date; only strictly-older outputs are stale.
///
/// This is a pure function extracted for property testing.
#[inline]
pub fn output_is_stale(input_mtime: SystemTime, output_mtime: Option<SystemTime>) -> bool {
    match output_mtime {
        None => true,
        Some(t) => t < input_mtime,
    }
}

/// Decide whether the input needs (re)processing.
///
/// - `force = true` always processes, without touching the filesystem.
/// - An unreadable input (vanished since enumeration) returns `false`.
/// - A missing output, or an output strictly older than the input,
///   returns `true`.
/// - Otherwise all outputs are up to date and the file is skipped.
pub fn should_process(input: &Path, outputs: &[PathBuf], force: bool) -> bool {
    if force {
        return true;
    }

    let input_mtime = match fs::metadata(input).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return false,
    };

    outputs.iter().any(|output| {
        let output_mtime = fs::metadata(output).and_then(|m| m.modified()).ok();
        output_is_stale(input_mtime, output_mtime)
    })
}
