//! Raster output: PNG encoding of visualizations and prepared regions.

use std::path::Path;

use huewatch_pipeline::RgbaImage;
use image::{GrayImage, ImageEncoder};

/// Errors that can occur while writing a raster.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    PngEncode(String),

    /// The file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl From<image::ImageError> for RasterError {
    fn from(err: image::ImageError) -> Self {
        Self::PngEncode(err.to_string())
    }
}

/// Encode an RGBA image as PNG bytes.
///
/// # Errors
///
/// Returns [`RasterError::PngEncode`] if encoding fails.
pub fn rgba_to_png(image: &RgbaImage) -> Result<Vec<u8>, RasterError> {
    let mut png_bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png_bytes).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(png_bytes)
}

/// Encode a grayscale image as PNG bytes.
///
/// # Errors
///
/// Returns [`RasterError::PngEncode`] if encoding fails.
pub fn gray_to_png(image: &GrayImage) -> Result<Vec<u8>, RasterError> {
    let mut png_bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png_bytes).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::L8,
    )?;
    Ok(png_bytes)
}

/// Write `image` to `path` as PNG.
///
/// # Errors
///
/// Returns [`RasterError::PngEncode`] if encoding fails and
/// [`RasterError::Write`] if the file cannot be written.
pub async fn write_png(path: &Path, image: &RgbaImage) -> Result<(), RasterError> {
    let bytes = rgba_to_png(image)?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| RasterError::Write {
            path: path.display().to_string(),
            source,
        })
}
