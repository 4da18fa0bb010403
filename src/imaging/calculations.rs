//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::Dimensions;

/// Calculate the size an image must shrink to so it fits inside `bound`.
///
/// Aspect ratio is preserved and images are never upscaled: returns `None`
/// when the source already fits. Neither output edge drops below 1px.
///
/// # Examples
/// ```
/// # use picname::imaging::{Dimensions, fit_within};
/// let bound = Dimensions::square(512);
/// // 2048x1024 landscape → 512x256
/// assert_eq!(
///     fit_within(Dimensions { width: 2048, height: 1024 }, bound),
///     Some(Dimensions { width: 512, height: 256 })
/// );
/// // Already small enough → untouched
/// assert_eq!(fit_within(Dimensions { width: 300, height: 200 }, bound), None);
/// ```
pub fn fit_within(source: Dimensions, bound: Dimensions) -> Option<Dimensions> {
    if source.width <= bound.width && source.height <= bound.height {
        return None;
    }

    let scale_w = bound.width as f64 / source.width as f64;
    let scale_h = bound.height as f64 / source.height as f64;
    let scale = scale_w.min(scale_h);

    let width = ((source.width as f64 * scale).round() as u32).clamp(1, bound.width);
    let height = ((source.height as f64 * scale).round() as u32).clamp(1, bound.height);
    Some(Dimensions { width, height })
}
