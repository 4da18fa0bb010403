//! Codec trait and shared types.
//!
//! The [`ImageCodec`] trait is the one seam between the rename pipeline and
//! pixel work: take a file, return a bounded, re-encoded upload payload.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_backend::RustCodec), built on the `image` crate.

use super::format::OutputFormat;
use super::params::{Dimensions, Quality};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    /// Kept apart from decode failures so callers can tell "file missing"
    /// from "corrupt or unsupported image".
    #[error("Source image not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// A compressed image ready to embed in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Base64 (standard alphabet, padded) of the encoded bytes.
    pub payload: String,
    pub format: OutputFormat,
}

impl EncodedImage {
    pub fn from_bytes(bytes: &[u8], format: OutputFormat) -> Self {
        Self {
            payload: BASE64.encode(bytes),
            format,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// `data:<mime>;base64,<payload>`
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.payload)
    }
}

/// Compresses a source image into an upload payload.
///
/// Implementations must be shareable across worker threads.
pub trait ImageCodec: Send + Sync {
    /// Decode `path`, shrink it to fit `max`, and re-encode it.
    fn compress(
        &self,
        path: &Path,
        quality: Quality,
        max: Dimensions,
    ) -> Result<EncodedImage, CodecError>;
}
