//! huewatch-pipeline: Pure pixel analysis (sans-IO).
//!
//! Two independent signals are computed from RGBA frames:
//!
//! - **color**: dominant-color clustering and its coverage,
//!   with a red overlay marking the dominant pixels;
//! - **motion**: grayscale -> Sobel edge points -> random-sample
//!   comparison with the previous frame's edge points.
//!
//! Both honour up to five rectangular exclusion areas and skip
//! transparent pixels.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! buffers and returns structured data. Frame acquisition, deadlines
//! and session state live in `huewatch-io`.

pub mod cluster;
pub mod edge;
pub mod enhance;
pub mod grayscale;
pub mod mask;
pub mod motion;
pub mod sampler;
pub mod types;

pub use cluster::{ClusterSummary, ColorCluster, DominantColor};
pub use mask::{ExcludedArea, ExclusionMask, Rect};
pub use motion::MotionComparison;
pub use sampler::{ANALYSIS_FPS, FrameSchedule, MotionSummary, MotionTracker, SampledFrame};
pub use types::{
    AnalysisConfig, AnalysisError, Dimensions, FrameAnalysisResult, MotionFrameAnalysisResult,
    Point, Rgb, RgbaImage,
};

/// Run the color analysis on an encoded still image.
///
/// # Pipeline steps
///
/// 1. Validate the configuration
/// 2. Decode the image to RGBA
/// 3. Cluster the analyzable pixels and pick the dominant color
/// 4. Paint the dominant pixels red for the visualization
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidConfig`] or
/// [`AnalysisError::InvalidExclusionGeometry`] before decoding if
/// `config` is out of range.
/// Returns [`AnalysisError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`AnalysisError::DecodeFailure`] if the image format is unrecognized.
/// Returns [`AnalysisError::NoAnalyzableContent`] if every pixel is
/// transparent or excluded.
pub fn process_image(
    image_bytes: &[u8],
    config: &AnalysisConfig,
) -> Result<FrameAnalysisResult, AnalysisError> {
    config.validate()?;
    let rgba = grayscale::decode(image_bytes)?;
    sampler::analyze_color_frame(&rgba, None, config)
}
