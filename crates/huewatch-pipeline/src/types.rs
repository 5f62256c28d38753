//! Shared types for the huewatch analysis pipeline.

use serde::{Deserialize, Serialize};

use crate::mask::{ExcludedArea, MAX_EXCLUDED_AREAS};

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can hand frames to the
/// pipeline without depending on `image` directly.
pub use image::RgbaImage;

/// Pixels with an alpha value below this are transparent and skipped by
/// every analysis stage.
pub const ALPHA_CUTOFF: u8 = 128;

/// Returns `true` if the pixel is opaque enough to be analyzed.
#[must_use]
pub const fn is_opaque(pixel: &image::Rgba<u8>) -> bool {
    pixel.0[3] >= ALPHA_CUTOFF
}

/// An integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Column, counted from the left edge.
    pub x: u32,
    /// Row, counted from the top edge.
    pub y: u32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// An opaque 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Pure red, used to paint the dominant-color visualization.
    pub const RED: Self = Self::new(255, 0, 0);

    /// Create a new color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Drop the alpha channel of an RGBA pixel.
    #[must_use]
    pub const fn from_rgba(pixel: &image::Rgba<u8>) -> Self {
        Self::new(pixel.0[0], pixel.0[1], pixel.0[2])
    }

    /// Squared Euclidean distance in RGB space.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> u32 {
        let dr = u32::from(self.r.abs_diff(other.r));
        let dg = u32::from(self.g.abs_diff(other.g));
        let db = u32::from(self.b.abs_diff(other.b));
        dr * dr + dg * dg + db * db
    }

    /// Returns `true` if `other` lies strictly closer than `threshold`.
    #[must_use]
    pub fn is_within(self, other: Self, threshold: f64) -> bool {
        f64::from(self.distance_squared(other)) < threshold * threshold
    }

    /// Lowercase `#rrggbb` notation.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an existing image.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Returns `true` if either side is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Runtime parameters for a single analysis session.
///
/// Every field can be changed between runs; there is no config file.
/// Missing fields in a JSON document fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Color clustering radius (Euclidean RGB distance, 0-255).
    pub color_threshold: f64,

    /// Optional coverage ratio (0.0-1.0) a dominant color must reach for
    /// the caller to call the region uniform.
    pub minimum_coverage: Option<f64>,

    /// Sobel gradient magnitude cutoff (0-255).
    pub edge_threshold: f64,

    /// Maximum number of edge points sampled per frame comparison.
    pub comparison_points: usize,

    /// Changed-point ratio (0.0-1.0) at or above which a frame counts as
    /// motion.
    pub tolerance: f64,

    /// Rectangles whose pixels are ignored by every stage.
    pub excluded_areas: Vec<ExcludedArea>,

    /// Longest accepted video duration in seconds.
    pub max_duration_secs: f64,
}

impl AnalysisConfig {
    /// Default color clustering radius.
    pub const DEFAULT_COLOR_THRESHOLD: f64 = 30.0;
    /// Default Sobel magnitude cutoff.
    pub const DEFAULT_EDGE_THRESHOLD: f64 = 70.0;
    /// Default motion sample cap.
    pub const DEFAULT_COMPARISON_POINTS: usize = 1000;
    /// Smallest accepted motion sample cap.
    pub const MIN_COMPARISON_POINTS: usize = 50;
    /// Largest accepted motion sample cap.
    pub const MAX_COMPARISON_POINTS: usize = 1000;
    /// Default motion tolerance.
    pub const DEFAULT_TOLERANCE: f64 = 0.1;
    /// Default video duration ceiling.
    pub const DEFAULT_MAX_DURATION_SECS: f64 = 15.0;
    /// Duration ceiling used by the short-clip tool variant.
    pub const SHORT_MAX_DURATION_SECS: f64 = 5.0;
    /// Largest accepted `max_duration_secs`.
    pub const MAX_DURATION_LIMIT_SECS: f64 = 3600.0;

    /// Check every parameter against its documented range.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidConfig`] for an out-of-range
    /// scalar and [`AnalysisError::InvalidExclusionGeometry`] for too
    /// many or degenerate exclusion areas.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        check_range("color_threshold", self.color_threshold, 0.0, 255.0)?;
        check_range("edge_threshold", self.edge_threshold, 0.0, 255.0)?;
        check_range("tolerance", self.tolerance, 0.0, 1.0)?;
        if let Some(coverage) = self.minimum_coverage {
            check_range("minimum_coverage", coverage, 0.0, 1.0)?;
        }
        if !(Self::MIN_COMPARISON_POINTS..=Self::MAX_COMPARISON_POINTS)
            .contains(&self.comparison_points)
        {
            return Err(AnalysisError::InvalidConfig(format!(
                "comparison_points must be in {}..={}, got {}",
                Self::MIN_COMPARISON_POINTS,
                Self::MAX_COMPARISON_POINTS,
                self.comparison_points,
            )));
        }
        if !(self.max_duration_secs > 0.0 && self.max_duration_secs <= Self::MAX_DURATION_LIMIT_SECS)
        {
            return Err(AnalysisError::InvalidConfig(format!(
                "max_duration_secs must be in (0, {}], got {}",
                Self::MAX_DURATION_LIMIT_SECS,
                self.max_duration_secs,
            )));
        }
        if self.excluded_areas.len() > MAX_EXCLUDED_AREAS {
            return Err(AnalysisError::InvalidExclusionGeometry(format!(
                "at most {MAX_EXCLUDED_AREAS} areas are allowed, got {}",
                self.excluded_areas.len(),
            )));
        }
        if let Some(area) = self.excluded_areas.iter().find(|a| a.rect.is_empty()) {
            return Err(AnalysisError::InvalidExclusionGeometry(format!(
                "area {} has zero width or height",
                area.id,
            )));
        }
        Ok(())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            color_threshold: Self::DEFAULT_COLOR_THRESHOLD,
            minimum_coverage: None,
            edge_threshold: Self::DEFAULT_EDGE_THRESHOLD,
            comparison_points: Self::DEFAULT_COMPARISON_POINTS,
            tolerance: Self::DEFAULT_TOLERANCE,
            excluded_areas: Vec::new(),
            max_duration_secs: Self::DEFAULT_MAX_DURATION_SECS,
        }
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<(), AnalysisError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(AnalysisError::InvalidConfig(format!(
            "{name} must be in {min}..={max}, got {value}"
        )))
    }
}

/// Color analysis of one still image or one sampled video frame.
///
/// Uses custom `Serialize`/`Deserialize` implementations because
/// `RgbaImage` does not implement serde traits. The visualization is
/// serialized as a `(width, height, raw_pixels)` tuple.
#[derive(Debug, Clone)]
pub struct FrameAnalysisResult {
    /// Timestamp in seconds; `None` for a still image.
    pub time: Option<f64>,
    /// Representative color of the largest cluster.
    pub dominant_color: Rgb,
    /// Share of analyzable pixels in the dominant cluster (0-100).
    pub percentage: f64,
    /// The frame with every dominant-colored pixel painted red.
    pub processed: RgbaImage,
}

/// Serde-compatible proxy for `FrameAnalysisResult`.
#[derive(Serialize, Deserialize)]
struct FrameAnalysisResultProxy {
    time: Option<f64>,
    dominant_color: Rgb,
    percentage: f64,
    processed: (u32, u32, Vec<u8>),
}

impl Serialize for FrameAnalysisResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = FrameAnalysisResultProxy {
            time: self.time,
            dominant_color: self.dominant_color,
            percentage: self.percentage,
            processed: (
                self.processed.width(),
                self.processed.height(),
                self.processed.as_raw().clone(),
            ),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FrameAnalysisResult {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = FrameAnalysisResultProxy::deserialize(deserializer)?;
        let (width, height, raw) = proxy.processed;
        let processed = RgbaImage::from_raw(width, height, raw)
            .ok_or_else(|| serde::de::Error::custom("invalid RGBA image dimensions"))?;
        Ok(Self {
            time: proxy.time,
            dominant_color: proxy.dominant_color,
            percentage: proxy.percentage,
            processed,
        })
    }
}

/// Motion analysis of one sampled video frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionFrameAnalysisResult {
    /// Zero-based sample index.
    pub frame: u32,
    /// Timestamp in seconds.
    pub time: f64,
    /// Share of sampled edge points that moved (0-100).
    pub changed_percentage: f64,
    /// `changed_percentage / 100 >= tolerance`.
    pub motion_detected: bool,
    /// Fewer edge points existed than the requested sample size.
    pub low_confidence: bool,
    /// Sampled points found at the same coordinate in the previous frame.
    pub stable_points: Vec<Point>,
    /// Sampled points absent from the previous frame.
    pub moved_points: Vec<Point>,
}

/// Errors that can occur during analysis.
///
/// Every payload is plain data so the error can cross a worker or
/// process boundary as JSON.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum AnalysisError {
    /// The upload is not an image or video this tool accepts.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// The video is longer than the configured ceiling.
    #[error("media is {duration:.2}s long, the limit is {limit:.2}s")]
    MediaTooLong {
        /// Source duration in seconds.
        duration: f64,
        /// Configured ceiling in seconds.
        limit: f64,
    },

    /// Media metadata or a specific frame could not be decoded.
    #[error("failed to decode media: {0}")]
    DecodeFailure(String),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// A raw pixel buffer does not match its declared dimensions.
    #[error("pixel buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    InvalidBuffer {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
        /// `width * height * 4`.
        expected: usize,
        /// Actual buffer length.
        actual: usize,
    },

    /// Every pixel was transparent or excluded.
    #[error("no analyzable pixels: every pixel is transparent or excluded")]
    NoAnalyzableContent,

    /// Exclusion areas are malformed or too numerous.
    #[error("invalid exclusion geometry: {0}")]
    InvalidExclusionGeometry(String),

    /// A runtime parameter is out of range.
    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(String),

    /// An external collaborator missed its deadline.
    #[error("{service} did not finish within {deadline_ms} ms")]
    ExternalServiceTimeout {
        /// Collaborator name, e.g. `"text recognition"`.
        service: String,
        /// Deadline that elapsed.
        deadline_ms: u64,
    },

    /// An external collaborator reported an error.
    #[error("{service} failed: {message}")]
    ExternalServiceFailure {
        /// Collaborator name.
        service: String,
        /// Collaborator-provided message.
        message: String,
    },

    /// The host could not provide a pixel buffer to read or write.
    #[error("pixel buffer context unavailable: {0}")]
    ContextUnavailable(String),

    /// The run was cancelled by the caller.
    #[error("analysis cancelled")]
    Cancelled,
}

impl From<image::ImageError> for AnalysisError {
    fn from(err: image::ImageError) -> Self {
        Self::DecodeFailure(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mask::Rect;

    #[test]
    fn rgb_distance() {
        let a = Rgb::new(0, 0, 0);
        let b = Rgb::new(3, 4, 0);
        assert_eq!(a.distance_squared(b), 25);
        assert_eq!(Rgb::new(255, 255, 255).distance_squared(a), 3 * 255 * 255);
    }

    #[test]
    fn rgb_is_within_is_strict() {
        let a = Rgb::new(0, 0, 0);
        let b = Rgb::new(3, 4, 0);
        assert!(!a.is_within(b, 5.0));
        assert!(a.is_within(b, 5.01));
    }

    #[test]
    fn rgb_hex() {
        assert_eq!(Rgb::new(255, 8, 171).to_hex(), "#ff08ab");
    }

    #[test]
    fn alpha_cutoff_boundary() {
        assert!(!is_opaque(&image::Rgba([0, 0, 0, 127])));
        assert!(is_opaque(&image::Rgba([0, 0, 0, 128])));
    }

    #[test]
    fn dimensions_emptiness() {
        let d = Dimensions {
            width: 640,
            height: 480,
        };
        assert!(!d.is_empty());
        assert!(
            Dimensions {
                width: 0,
                height: 3
            }
            .is_empty()
        );
    }

    // --- AnalysisConfig tests ---

    #[test]
    fn config_defaults() {
        let config = AnalysisConfig::default();
        assert!((config.color_threshold - 30.0).abs() < f64::EPSILON);
        assert!((config.edge_threshold - 70.0).abs() < f64::EPSILON);
        assert_eq!(config.comparison_points, 1000);
        assert!((config.tolerance - 0.1).abs() < f64::EPSILON);
        assert!(config.minimum_coverage.is_none());
        assert!(config.excluded_areas.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_out_of_range_scalars() {
        let bad = [
            AnalysisConfig {
                color_threshold: 256.0,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                edge_threshold: -1.0,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                tolerance: f64::NAN,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                minimum_coverage: Some(1.5),
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                comparison_points: 49,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                max_duration_secs: 0.0,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                max_duration_secs: 3600.5,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                max_duration_secs: f64::INFINITY,
                ..AnalysisConfig::default()
            },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(AnalysisError::InvalidConfig(_))),
                "expected InvalidConfig for {config:?}",
            );
        }
    }

    #[test]
    fn duration_ceiling_is_bounded() {
        let longest = AnalysisConfig {
            max_duration_secs: AnalysisConfig::MAX_DURATION_LIMIT_SECS,
            ..AnalysisConfig::default()
        };
        assert!(longest.validate().is_ok());
    }

    #[test]
    fn config_rejects_too_many_areas() {
        let config = AnalysisConfig {
            excluded_areas: (0..6)
                .map(|id| ExcludedArea::new(id, Rect::new(0, 0, 1, 1)))
                .collect(),
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::InvalidExclusionGeometry(_))
        ));
    }

    #[test]
    fn config_rejects_empty_area() {
        let config = AnalysisConfig {
            excluded_areas: vec![ExcludedArea::new(1, Rect::new(0, 0, 0, 5))],
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::InvalidExclusionGeometry(_))
        ));
    }

    #[test]
    fn config_partial_json_uses_defaults() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"tolerance":0.25}"#).unwrap();
        assert!((config.tolerance - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.comparison_points, 1000);
    }

    // --- AnalysisError tests ---

    #[test]
    fn error_media_too_long_display() {
        let err = AnalysisError::MediaTooLong {
            duration: 16.5,
            limit: 15.0,
        };
        assert_eq!(err.to_string(), "media is 16.50s long, the limit is 15.00s");
    }

    #[test]
    fn error_timeout_display() {
        let err = AnalysisError::ExternalServiceTimeout {
            service: "text recognition".to_string(),
            deadline_ms: 5000,
        };
        assert_eq!(
            err.to_string(),
            "text recognition did not finish within 5000 ms"
        );
    }

    #[test]
    fn image_error_maps_to_decode_failure() {
        let err: AnalysisError = image::load_from_memory(&[0xFF, 0x00]).unwrap_err().into();
        assert!(matches!(err, AnalysisError::DecodeFailure(_)));
    }

    #[test]
    fn frame_result_serde_keeps_pixels() {
        let result = FrameAnalysisResult {
            time: Some(0.2),
            dominant_color: Rgb::RED,
            percentage: 75.0,
            processed: RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255])),
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: FrameAnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.time, Some(0.2));
        assert_eq!(back.dominant_color, Rgb::RED);
        assert_eq!(back.processed.as_raw(), result.processed.as_raw());
    }

    #[test]
    fn frame_result_rejects_truncated_pixels() {
        let json = r#"{"time":null,"dominant_color":{"r":0,"g":0,"b":0},"percentage":1.0,"processed":[2,2,[0,0,0]]}"#;
        assert!(serde_json::from_str::<FrameAnalysisResult>(json).is_err());
    }
}
