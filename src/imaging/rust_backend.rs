//! Pure Rust codec built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Step | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, BMP, TIFF, WebP) | `image::ImageReader` with content sniffing |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3`, sized by [`fit_within`] |
//! | Encode → JPEG | `jpeg_encoder::Encoder`, progressive with optimized Huffman tables |
//! | Encode → PNG | `image::codecs::png::PngEncoder`, best compression + adaptive filter |
//! | Payload | `base64` standard alphabet |

use super::backend::{CodecError, EncodedImage, ImageCodec};
use super::calculations::fit_within;
use super::format::{OutputFormat, SourceKind, choose_output_format};
use super::params::{Dimensions, Quality};
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::error::{EncodingError, LimitError, LimitErrorKind};
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use std::path::Path;
use std::sync::LazyLock;

/// Extensions the batch picks up, paired with the decoder they need.
const IMAGE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    IMAGE_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the lowercase image extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Codec backed by the `image` crate.
///
/// See the [module docs](self) for the crate-to-step mapping.
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode an image, sniffing the container from its content.
fn load_image(path: &Path) -> Result<(DynamicImage, SourceKind), CodecError> {
    let decode_error = |source: image::ImageError| CodecError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let reader = ImageReader::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CodecError::NotFound(path.to_path_buf())
        } else {
            decode_error(e.into())
        }
    })?;
    let reader = reader
        .with_guessed_format()
        .map_err(|e| decode_error(e.into()))?;
    let kind = SourceKind::from_format(reader.format());
    let image = reader.decode().map_err(decode_error)?;
    Ok((image, kind))
}

fn encode(image: &DynamicImage, format: OutputFormat, quality: Quality) -> image::ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    match format {
        OutputFormat::Jpeg => encode_jpeg(image, quality, &mut bytes)?,
        OutputFormat::Png => {
            let pixels = if image.color().has_alpha() {
                DynamicImage::ImageRgba8(image.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(image.to_rgb8())
            };
            let encoder =
                PngEncoder::new_with_quality(&mut bytes, CompressionType::Best, PngFilter::Adaptive);
            pixels.write_with_encoder(encoder)?;
        }
    }
    Ok(bytes)
}

/// Progressive JPEG with optimized Huffman tables. `image`'s own encoder
/// only writes baseline frames, so the pixels go through `jpeg-encoder`.
fn encode_jpeg(image: &DynamicImage, quality: Quality, out: &mut Vec<u8>) -> image::ImageResult<()> {
    // JPEG has no alpha channel
    let rgb = image.to_rgb8();
    let (Ok(width), Ok(height)) = (u16::try_from(rgb.width()), u16::try_from(rgb.height())) else {
        return Err(ImageError::Limits(LimitError::from_kind(
            LimitErrorKind::DimensionError,
        )));
    };

    let mut encoder = jpeg_encoder::Encoder::new(out, quality.value() as u8);
    encoder.set_progressive(true);
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| ImageError::Encoding(EncodingError::new(ImageFormat::Jpeg.into(), e)))
}

impl ImageCodec for RustCodec {
    fn compress(
        &self,
        path: &Path,
        quality: Quality,
        max: Dimensions,
    ) -> Result<EncodedImage, CodecError> {
        let (image, kind) = load_image(path)?;

        let source = Dimensions {
            width: image.width(),
            height: image.height(),
        };
        let image = match fit_within(source, max) {
            Some(target) => image.resize_exact(target.width, target.height, FilterType::Lanczos3),
            None => image,
        };

        let format = choose_output_format(kind, image.color().has_alpha());
        let bytes = encode(&image, format, quality).map_err(|source| CodecError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(EncodedImage::from_bytes(&bytes, format))
    }
}
