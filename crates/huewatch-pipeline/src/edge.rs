//! Sobel edge-point detection.
//!
//! Convolves a grayscale image with the 3×3 Sobel kernels and returns
//! the coordinates of every interior pixel whose gradient magnitude
//! strictly exceeds a threshold. Border pixels are never evaluated, and
//! pixels inside an exclusion area are skipped (their neighbours still
//! feed the convolution of pixels outside the area).
//!
//! The result is in scan order: left to right, top to bottom.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;

use crate::mask::ExclusionMask;
use crate::types::Point;

/// Per-pixel Sobel gradients `(gx, gy)`.
///
/// Values at the image border use clamped neighbours; callers that
/// follow the interior-only rule never read them.
#[must_use = "returns the gradient images"]
pub fn sobel_gradients(gray: &GrayImage) -> (Image<Luma<i16>>, Image<Luma<i16>>) {
    let gx: Image<Luma<i16>> = filter_clamped(gray, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(gray, kernel::SOBEL_VERTICAL_3X3);
    (gx, gy)
}

/// Find interior pixels whose Sobel magnitude exceeds `threshold`.
///
/// Only pixels with `1 <= x < width - 1` and `1 <= y < height - 1` are
/// considered, so images narrower or shorter than 3 pixels yield no
/// points. The comparison is strict: a magnitude equal to `threshold`
/// is not an edge, which makes a flat image empty even at threshold 0.
#[must_use = "returns the edge points"]
pub fn detect_edge_points(gray: &GrayImage, threshold: f64, mask: ExclusionMask<'_>) -> Vec<Point> {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return Vec::new();
    }

    let (gx, gy) = sobel_gradients(gray);
    let mut points = Vec::new();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            if mask.is_excluded(x, y) {
                continue;
            }
            let dx = f64::from(gx.get_pixel(x, y).0[0]);
            let dy = f64::from(gy.get_pixel(x, y).0[0]);
            if dx.hypot(dy) > threshold {
                points.push(Point::new(x, y));
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{ExcludedArea, Rect};
    use crate::types::Dimensions;

    /// 20x20 image with a sharp vertical boundary at x = 10.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, _y| {
            if x < 10 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    /// Deterministic pseudo-noise so threshold sweeps see many magnitudes.
    fn noisy_image() -> GrayImage {
        GrayImage::from_fn(24, 18, |x, y| {
            let v = (x * 37 + y * 91 + x * y * 13) % 256;
            image::Luma([u8::try_from(v).unwrap_or(0)])
        })
    }

    #[test]
    fn flat_image_has_no_edges_even_at_zero_threshold() {
        let img = GrayImage::from_pixel(20, 20, image::Luma([128]));
        assert!(detect_edge_points(&img, 0.0, ExclusionMask::NONE).is_empty());
    }

    #[test]
    fn sharp_boundary_is_detected() {
        let points = detect_edge_points(&sharp_edge_image(), 70.0, ExclusionMask::NONE);
        assert!(!points.is_empty());
        // Gradient is nonzero only in the two columns touching the step.
        assert!(points.iter().all(|p| p.x == 9 || p.x == 10));
        // 18 interior rows, two columns each.
        assert_eq!(points.len(), 36);
    }

    #[test]
    fn step_magnitude_matches_kernel_weights() {
        // Across a 0 -> 255 step every interior row sees gx = 4 * 255.
        let points = detect_edge_points(&sharp_edge_image(), 1019.0, ExclusionMask::NONE);
        assert_eq!(points.len(), 36);
        let none = detect_edge_points(&sharp_edge_image(), 1020.0, ExclusionMask::NONE);
        assert!(none.is_empty(), "magnitude equal to threshold must not count");
    }

    #[test]
    fn only_interior_points_are_reported() {
        let img = noisy_image();
        let (w, h) = img.dimensions();
        let points = detect_edge_points(&img, 0.0, ExclusionMask::NONE);
        assert!(!points.is_empty());
        for p in &points {
            assert!(p.x >= 1 && p.x < w - 1, "x on border: {p:?}");
            assert!(p.y >= 1 && p.y < h - 1, "y on border: {p:?}");
        }
    }

    #[test]
    fn points_are_in_scan_order() {
        let points = detect_edge_points(&noisy_image(), 50.0, ExclusionMask::NONE);
        assert!(
            points
                .windows(2)
                .all(|w| (w[0].y, w[0].x) < (w[1].y, w[1].x))
        );
    }

    #[test]
    fn higher_threshold_yields_subset() {
        let img = noisy_image();
        let mut previous = detect_edge_points(&img, 0.0, ExclusionMask::NONE);
        for threshold in [10.0, 70.0, 150.0, 255.0, 600.0] {
            let current = detect_edge_points(&img, threshold, ExclusionMask::NONE);
            assert!(
                current.iter().all(|p| previous.contains(p)),
                "threshold {threshold} added points"
            );
            previous = current;
        }
    }

    #[test]
    fn excluded_pixels_are_skipped() {
        let areas = [ExcludedArea::new(1, Rect::new(0, 0, 20, 10))];
        let points = detect_edge_points(&sharp_edge_image(), 70.0, ExclusionMask::new(&areas));
        assert_eq!(points.len(), 18);
        assert!(points.iter().all(|p| p.y >= 10));
    }

    #[test]
    fn full_frame_exclusion_is_empty() {
        let img = noisy_image();
        let areas = [ExcludedArea::new(1, Rect::covering(Dimensions::of(&img)))];
        let points = detect_edge_points(&img, 0.0, ExclusionMask::new(&areas));
        assert!(points.is_empty());
    }

    #[test]
    fn tiny_images_have_no_interior() {
        for (w, h) in [(0, 0), (1, 5), (2, 2), (5, 2)] {
            let img = GrayImage::from_pixel(w, h, image::Luma([0]));
            assert!(detect_edge_points(&img, 0.0, ExclusionMask::NONE).is_empty());
        }
    }

    #[test]
    fn deterministic_for_identical_input() {
        let img = noisy_image();
        assert_eq!(
            detect_edge_points(&img, 70.0, ExclusionMask::NONE),
            detect_edge_points(&img, 70.0, ExclusionMask::NONE),
        );
    }
}
