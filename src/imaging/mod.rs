//! Image compression for upload, in pure Rust.
//!
//! | Step | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (content-sniffed) |
//! | **Shrink** | Lanczos3, never upscaling |
//! | **Choose container** | explicit decision table in [`format`] |
//! | **Encode** | JPEG at configured quality, or lossless PNG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Quality and size caps
//! - **Format**: source → upload container decision table
//! - **Backend**: [`ImageCodec`] trait + [`RustCodec`]

pub mod backend;
mod calculations;
pub mod format;
mod params;
pub mod rust_backend;

pub use backend::{CodecError, EncodedImage, ImageCodec};
pub use calculations::fit_within;
pub use format::{OutputFormat, SourceKind, choose_output_format};
pub use params::{Dimensions, Quality, UPLOAD_MAX_DIMENSIONS};
pub use rust_backend::{RustCodec, supported_input_extensions};
