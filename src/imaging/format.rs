//! Output container selection.
//!
//! The upload format depends on two facts about the decoded source: its
//! container and whether the pixels carry alpha. The mapping is a table
//! rather than nested conditionals so each row can be checked on its own:
//!
//! | source | alpha | upload as |
//! |---|---|---|
//! | GIF, WebP | any | PNG |
//! | any | yes | PNG |
//! | PNG | no | PNG |
//! | JPEG | no | JPEG |
//! | anything else | no | JPEG |
//!
//! GIF and WebP go to PNG because they may be animated or transparent and the
//! lossless encoder is the only one here that preserves transparency.

use image::ImageFormat;

/// Container family of the decoded source, as far as format choice cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Jpeg,
    Png,
    Gif,
    WebP,
    Other,
}

impl SourceKind {
    pub fn from_format(format: Option<ImageFormat>) -> Self {
        match format {
            Some(ImageFormat::Jpeg) => Self::Jpeg,
            Some(ImageFormat::Png) => Self::Png,
            Some(ImageFormat::Gif) => Self::Gif,
            Some(ImageFormat::WebP) => Self::WebP,
            _ => Self::Other,
        }
    }
}

/// Container the image is re-encoded into before upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Lossy, no alpha. Encoded with the configured quality.
    Jpeg,
    /// Lossless, keeps alpha. Encoded with maximum compression.
    Png,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Lowercase format tag, as used in the MIME subtype.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }
}

/// `(source kind, alpha, output)`. `None` matches anything; first match wins.
const DECISION_TABLE: &[(Option<SourceKind>, Option<bool>, OutputFormat)] = &[
    (Some(SourceKind::Gif), None, OutputFormat::Png),
    (Some(SourceKind::WebP), None, OutputFormat::Png),
    (None, Some(true), OutputFormat::Png),
    (Some(SourceKind::Png), None, OutputFormat::Png),
    (Some(SourceKind::Jpeg), None, OutputFormat::Jpeg),
    (None, None, OutputFormat::Jpeg),
];

/// Pick the upload container for a decoded source. See the [module docs](self).
pub fn choose_output_format(source: SourceKind, has_alpha: bool) -> OutputFormat {
    DECISION_TABLE
        .iter()
        .find(|(kind, alpha, _)| {
            kind.is_none_or(|k| k == source) && alpha.is_none_or(|a| a == has_alpha)
        })
        .map(|(_, _, output)| *output)
        .unwrap_or(OutputFormat::Jpeg)
}
