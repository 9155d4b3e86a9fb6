//! Codec boundary for imgforge
//!
//! The actual pixel decode/resize/re-encode work lives behind the `Codec`
//! trait so the orchestrator can be exercised with a mock in tests. The
//! shipped implementation shells out to ImageMagick.

pub mod magick;

pub use magick::{build_convert_command, build_identify_command, MagickCodec};

use crate::retry::WorkError;
use crate::rules::ImageMeta;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One output to produce from an input file.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeTarget {
    /// Output format (also the file extension), e.g. "webp".
    pub format: String,
    /// Destination path for this output.
    pub path: PathBuf,
    /// Encoding quality for this format.
    pub quality: u8,
}

/// One unit of encoding work: a single input converted into all its targets.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    pub input: PathBuf,
    pub targets: Vec<EncodeTarget>,
}

/// External image codec.
#[async_trait]
pub trait Codec: Send + Sync {
    /// Read image dimensions for rule evaluation. `Ok(None)` means the
    /// metadata is unavailable; size-predicate rules then never match.
    async fn probe(&self, path: &Path) -> Result<Option<ImageMeta>, WorkError>;

    /// Produce every target of the request. Failures carry an optional
    /// machine-readable code used by retry classification.
    async fn encode(&self, request: &EncodeRequest) -> Result<(), WorkError>;
}
