//! Parameter types for the codec.
//!
//! - [`Quality`]: lossy encoding quality (1–95, default 80). Clamped on construction.
//! - [`Dimensions`]: a width/height pair, used both for measured images and size caps.

/// Quality setting for lossy image encoding (1-95).
///
/// 95 is the ceiling: above it JPEG files grow quickly with no visible gain,
/// which only inflates the upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 95;

    pub fn new(value: u32) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn square(edge: u32) -> Self {
        Self {
            width: edge,
            height: edge,
        }
    }
}

/// Size cap applied before upload. Small enough to keep request bodies
/// modest, large enough for the model to recognise the subject.
pub const UPLOAD_MAX_DIMENSIONS: Dimensions = Dimensions::square(512);
