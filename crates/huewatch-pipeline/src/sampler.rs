//! Fixed-rate frame sampling and the per-frame analysis fold.
//!
//! Videos are sampled at [`ANALYSIS_FPS`] regardless of their native
//! frame rate. This module owns the pure half of that loop: which
//! timestamps to visit, what to compute for each decoded frame, and the
//! state threaded from one motion frame to the next. Acquiring the
//! pixels is the host's job (see the `huewatch-io` session).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cluster;
use crate::edge;
use crate::grayscale;
use crate::mask::{ExcludedArea, ExclusionMask};
use crate::motion::{self, MotionComparison};
use crate::types::{
    AnalysisConfig, AnalysisError, FrameAnalysisResult, MotionFrameAnalysisResult, Point,
    RgbaImage,
};

/// Sampling rate applied to every video, in frames per second.
pub const ANALYSIS_FPS: u32 = 15;

/// Number of frames sampled from a clip of `duration_secs`.
///
/// `floor(duration * ANALYSIS_FPS)`. Non-finite or negative durations
/// sample nothing.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn total_frames(duration_secs: f64) -> u32 {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return 0;
    }
    let frames = (duration_secs * f64::from(ANALYSIS_FPS)).floor();
    if frames >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        frames as u32
    }
}

/// Timestamp of sample `index`, in seconds.
#[must_use]
pub fn frame_time(index: u32) -> f64 {
    f64::from(index) / f64::from(ANALYSIS_FPS)
}

/// Reject clips longer than `limit_secs`.
///
/// # Errors
///
/// Returns [`AnalysisError::MediaTooLong`] if `duration_secs > limit_secs`,
/// and [`AnalysisError::DecodeFailure`] if the duration is not a finite,
/// non-negative number (the host could not read the metadata).
pub fn check_duration(duration_secs: f64, limit_secs: f64) -> Result<(), AnalysisError> {
    if !duration_secs.is_finite() || duration_secs < 0.0 {
        return Err(AnalysisError::DecodeFailure(format!(
            "media reports an invalid duration: {duration_secs}"
        )));
    }
    if duration_secs > limit_secs {
        return Err(AnalysisError::MediaTooLong {
            duration: duration_secs,
            limit: limit_secs,
        });
    }
    Ok(())
}

/// One scheduled sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampledFrame {
    /// Zero-based sample index.
    pub index: u32,
    /// Seek target in seconds.
    pub time: f64,
}

/// Iterator over the samples of one clip, in ascending order.
#[derive(Debug, Clone)]
pub struct FrameSchedule {
    next: u32,
    total: u32,
}

impl FrameSchedule {
    /// Schedule for a clip of `duration_secs`.
    #[must_use]
    pub fn for_duration(duration_secs: f64) -> Self {
        Self {
            next: 0,
            total: total_frames(duration_secs),
        }
    }

    /// Total number of samples, including those already yielded.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.total
    }
}

impl Iterator for FrameSchedule {
    type Item = SampledFrame;

    fn next(&mut self) -> Option<SampledFrame> {
        if self.next >= self.total {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(SampledFrame {
            index,
            time: frame_time(index),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.total - self.next).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrameSchedule {}

/// Dominant-color analysis of one frame.
///
/// Pass `time = None` for a still image.
///
/// # Errors
///
/// Returns [`AnalysisError::NoAnalyzableContent`] if every pixel is
/// transparent or excluded.
pub fn analyze_color_frame(
    image: &RgbaImage,
    time: Option<f64>,
    config: &AnalysisConfig,
) -> Result<FrameAnalysisResult, AnalysisError> {
    let mask = ExclusionMask::new(&config.excluded_areas);
    let summary = cluster::cluster_colors(image, config.color_threshold, mask);
    let dominant = cluster::dominant_color(&summary)?;
    let processed = cluster::highlight_color(image, dominant.color, config.color_threshold, mask);
    Ok(FrameAnalysisResult {
        time,
        dominant_color: dominant.color,
        percentage: dominant.percentage,
        processed,
    })
}

/// Carries the previous frame's edge points through a motion run.
///
/// The first frame a tracker sees has no predecessor. It reports 0%
/// change and no motion, and its edge points become the reference for
/// the next frame.
#[derive(Debug)]
pub struct MotionTracker<R> {
    edge_threshold: f64,
    comparison_points: usize,
    tolerance: f64,
    excluded_areas: Vec<ExcludedArea>,
    previous: Vec<Point>,
    has_reference: bool,
    rng: R,
}

impl<R: Rng> MotionTracker<R> {
    /// Tracker using the motion parameters of `config`.
    #[must_use]
    pub fn new(config: &AnalysisConfig, rng: R) -> Self {
        Self {
            edge_threshold: config.edge_threshold,
            comparison_points: config.comparison_points,
            tolerance: config.tolerance,
            excluded_areas: config.excluded_areas.clone(),
            previous: Vec::new(),
            has_reference: false,
            rng,
        }
    }

    /// Edge points of the last analyzed frame.
    #[must_use]
    pub fn previous_points(&self) -> &[Point] {
        &self.previous
    }

    /// Detect edges in `image`, compare them with the previous frame,
    /// and keep them for the next call.
    pub fn analyze_frame(
        &mut self,
        frame: SampledFrame,
        image: &RgbaImage,
    ) -> MotionFrameAnalysisResult {
        let gray = grayscale::to_grayscale(image);
        let mask = ExclusionMask::new(&self.excluded_areas);
        let current = edge::detect_edge_points(&gray, self.edge_threshold, mask);
        let comparison = if self.has_reference {
            motion::compare_edge_points(
                &self.previous,
                &current,
                self.comparison_points,
                self.tolerance,
                &mut self.rng,
            )
        } else {
            MotionComparison::baseline(current.len(), self.comparison_points)
        };
        self.previous = current;
        self.has_reference = true;

        MotionFrameAnalysisResult {
            frame: frame.index,
            time: frame.time,
            changed_percentage: comparison.changed_percentage,
            motion_detected: comparison.motion_detected,
            low_confidence: comparison.low_confidence,
            stable_points: comparison.stable_points,
            moved_points: comparison.moved_points,
        }
    }
}

/// Aggregate view of a motion run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionSummary {
    /// Frames in the run.
    pub frames_analyzed: usize,
    /// Frames flagged with motion.
    pub frames_with_motion: usize,
    /// Frames whose sample was smaller than requested.
    pub low_confidence_frames: usize,
    /// Mean of `changed_percentage`, 0 for an empty run.
    pub mean_changed_percentage: f64,
    /// Largest `changed_percentage`, 0 for an empty run.
    pub peak_changed_percentage: f64,
}

/// Summarize a run's per-frame results.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize_motion(results: &[MotionFrameAnalysisResult]) -> MotionSummary {
    if results.is_empty() {
        return MotionSummary::default();
    }
    let total: f64 = results.iter().map(|r| r.changed_percentage).sum();
    MotionSummary {
        frames_analyzed: results.len(),
        frames_with_motion: results.iter().filter(|r| r.motion_detected).count(),
        low_confidence_frames: results.iter().filter(|r| r.low_confidence).count(),
        mean_changed_percentage: total / results.len() as f64,
        peak_changed_percentage: results
            .iter()
            .map(|r| r.changed_percentage)
            .fold(0.0, f64::max),
    }
}
