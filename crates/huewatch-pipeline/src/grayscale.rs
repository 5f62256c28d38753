//! Pixel buffer intake and grayscale conversion.
//!
//! Frames reach the pipeline either as encoded image bytes (decoded
//! here with the `image` crate) or as raw row-major RGBA buffers handed
//! over by the host. Both become an [`RgbaImage`], and the motion path
//! converts that to a single-channel [`GrayImage`].

use image::GrayImage;

use crate::types::{AnalysisError, RgbaImage};

/// Decode raw image bytes into RGBA.
///
/// Supports whatever formats the `image` crate was built with (PNG,
/// JPEG, BMP, WebP, GIF).
///
/// # Errors
///
/// Returns [`AnalysisError::EmptyInput`] if `bytes` is empty.
/// Returns [`AnalysisError::DecodeFailure`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, AnalysisError> {
    if bytes.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Wrap a raw row-major RGBA buffer.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidBuffer`] if `data.len()` is not
/// `width * height * 4`.
pub fn rgba_from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<RgbaImage, AnalysisError> {
    let expected = usize::try_from(u64::from(width) * u64::from(height) * 4).unwrap_or(usize::MAX);
    let actual = data.len();
    if actual != expected {
        return Err(AnalysisError::InvalidBuffer {
            width,
            height,
            expected,
            actual,
        });
    }
    RgbaImage::from_raw(width, height, data).ok_or(AnalysisError::InvalidBuffer {
        width,
        height,
        expected,
        actual,
    })
}

/// Luminosity of one RGB triple: `0.299*R + 0.587*G + 0.114*B`,
/// truncated.
///
/// Computed in integer thousandths so pure white maps to exactly 255.
#[must_use]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    // The weights sum to 1000, so the quotient never exceeds 255.
    u8::try_from(weighted / 1000).unwrap_or(u8::MAX)
}

/// Convert an RGBA image to grayscale with [`luminance`].
///
/// Alpha is ignored; the output has one sample per input pixel.
#[must_use = "returns the grayscale image"]
pub fn to_grayscale(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        image::Luma([luminance(r, g, b)])
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: encode an RGBA image as PNG bytes.
    fn encode_png(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode(&[]), Err(AnalysisError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_decode_failure() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(AnalysisError::DecodeFailure(_))));
    }

    #[test]
    fn png_round_trips_through_decode() {
        let img = RgbaImage::from_fn(3, 2, |x, y| image::Rgba([x as u8 * 50, y as u8 * 70, 9, 255]));
        let decoded = decode(&encode_png(&img)).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn raw_buffer_length_is_checked() {
        assert!(rgba_from_raw(2, 2, vec![0; 16]).is_ok());
        let err = rgba_from_raw(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InvalidBuffer {
                width: 2,
                height: 2,
                expected: 16,
                actual: 15,
            }
        );
    }

    #[test]
    fn luminance_weights() {
        assert_eq!(luminance(0, 0, 0), 0);
        assert_eq!(luminance(255, 255, 255), 255);
        // 0.299 * 255 = 76.245
        assert_eq!(luminance(255, 0, 0), 76);
        // 0.587 * 255 = 149.685
        assert_eq!(luminance(0, 255, 0), 149);
        // 0.114 * 255 = 29.07
        assert_eq!(luminance(0, 0, 255), 29);
    }

    #[test]
    fn output_matches_input_pixel_count() {
        let img = RgbaImage::from_fn(17, 31, |x, y| image::Rgba([x as u8, y as u8, 200, 10]));
        let gray = to_grayscale(&img);
        assert_eq!(gray.width(), 17);
        assert_eq!(gray.height(), 31);
        assert_eq!(gray.as_raw().len(), 17 * 31);
    }

    #[test]
    fn alpha_does_not_affect_luminance() {
        let opaque = RgbaImage::from_pixel(1, 1, image::Rgba([10, 200, 30, 255]));
        let clear = RgbaImage::from_pixel(1, 1, image::Rgba([10, 200, 30, 0]));
        assert_eq!(to_grayscale(&opaque), to_grayscale(&clear));
    }

    #[test]
    fn every_channel_extreme_stays_in_range() {
        for r in [0u8, 128, 255] {
            for g in [0u8, 128, 255] {
                for b in [0u8, 128, 255] {
                    let expected = (0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b))
                        .floor();
                    let got = f64::from(luminance(r, g, b));
                    assert!((got - expected).abs() <= 1.0, "rgb({r},{g},{b}) -> {got}");
                }
            }
        }
    }
}
