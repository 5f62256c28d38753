//! Region preparation for external text recognition.
//!
//! The recognizer is handed a cropped, contrast-stretched and optionally
//! binarized grayscale region rather than the full frame.

use image::GrayImage;
use imageproc::contrast::{self, ThresholdType};
use serde::{Deserialize, Serialize};

use crate::grayscale;
use crate::mask::Rect;
use crate::types::{AnalysisError, Dimensions, RgbaImage};

/// Largest contrast adjustment accepted in either direction.
pub const MAX_CONTRAST: f64 = 255.0;

/// How a prepared region is reduced to black and white.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Binarization {
    /// Keep the grayscale values.
    #[default]
    None,
    /// Pixels strictly above the level become white.
    Fixed(u8),
    /// Level chosen per region with Otsu's method.
    Otsu,
}

/// Copy `region` out of `image`.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidConfig`] if the region is empty or
/// extends past the image.
pub fn extract_region(image: &RgbaImage, region: Rect) -> Result<RgbaImage, AnalysisError> {
    if region.is_empty() || !region.fits_within(Dimensions::of(image)) {
        return Err(AnalysisError::InvalidConfig(format!(
            "region {}x{} at ({}, {}) does not fit a {}x{} image",
            region.width,
            region.height,
            region.x,
            region.y,
            image.width(),
            image.height(),
        )));
    }
    Ok(image::imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image())
}

/// Contrast multiplier for an adjustment of `amount` (-255..=255).
#[must_use]
pub fn contrast_factor(amount: f64) -> f64 {
    let c = amount.clamp(-MAX_CONTRAST, MAX_CONTRAST);
    (259.0 * (c + 255.0)) / (255.0 * (259.0 - c))
}

/// Stretch each sample away from mid-gray by [`contrast_factor`].
#[must_use = "returns the adjusted image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn adjust_contrast(gray: &GrayImage, amount: f64) -> GrayImage {
    let factor = contrast_factor(amount);
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        let v = factor.mul_add(f64::from(pixel.0[0]) - 128.0, 128.0);
        pixel.0[0] = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Threshold `gray` at `level`: above becomes 255, the rest 0.
#[must_use = "returns the binarized image"]
pub fn binarize(gray: &GrayImage, level: u8) -> GrayImage {
    contrast::threshold(gray, level, ThresholdType::Binary)
}

/// Threshold `gray` at its Otsu level. Returns the image and the level.
#[must_use = "returns the binarized image"]
pub fn binarize_otsu(gray: &GrayImage) -> (GrayImage, u8) {
    let level = contrast::otsu_level(gray);
    (binarize(gray, level), level)
}

/// Crop, convert to grayscale, adjust contrast and binarize.
///
/// # Errors
///
/// Propagates [`extract_region`] errors.
pub fn prepare_for_recognition(
    image: &RgbaImage,
    region: Rect,
    contrast_amount: f64,
    binarization: Binarization,
) -> Result<GrayImage, AnalysisError> {
    let cropped = extract_region(image, region)?;
    let gray = adjust_contrast(&grayscale::to_grayscale(&cropped), contrast_amount);
    Ok(match binarization {
        Binarization::None => gray,
        Binarization::Fixed(level) => binarize(&gray, level),
        Binarization::Otsu => binarize_otsu(&gray).0,
    })
}
