//! Frame-to-frame edge-point comparison.
//!
//! A random sample of the current frame's edge points is looked up by
//! exact coordinate in the previous frame's point set. Hits are
//! "stable", misses are "moved". Exact matching means a one-pixel shift
//! already counts as movement; callers tune the edge threshold and
//! tolerance to compensate.
//!
//! Sampling is uniform without replacement. The RNG is supplied by the
//! caller so runs can be reproduced with a seeded generator.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::types::Point;

/// Outcome of comparing one frame's edge points with the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionComparison {
    /// `moved / sample_size * 100`, or 0 when nothing was sampled.
    pub changed_percentage: f64,
    /// `changed_percentage / 100 >= tolerance` (never set for an empty
    /// sample).
    pub motion_detected: bool,
    /// The frame had some edge points, but fewer than requested.
    pub low_confidence: bool,
    /// Sampled points present in the previous frame.
    pub stable_points: Vec<Point>,
    /// Sampled points absent from the previous frame.
    pub moved_points: Vec<Point>,
}

impl MotionComparison {
    /// The result for a frame with nothing to sample.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            changed_percentage: 0.0,
            motion_detected: false,
            low_confidence: false,
            stable_points: Vec::new(),
            moved_points: Vec::new(),
        }
    }

    /// The result for a frame that has nothing to be compared with.
    ///
    /// Reports no change and no motion; only the confidence flag
    /// reflects the frame's own edge count.
    #[must_use]
    pub const fn baseline(current_len: usize, comparison_points: usize) -> Self {
        Self {
            changed_percentage: 0.0,
            motion_detected: false,
            low_confidence: is_low_confidence(current_len, comparison_points),
            stable_points: Vec::new(),
            moved_points: Vec::new(),
        }
    }

    /// Number of points that were sampled.
    #[must_use]
    pub fn sample_size(&self) -> usize {
        self.stable_points.len() + self.moved_points.len()
    }
}

/// Some edge points, but fewer than the requested sample.
const fn is_low_confidence(current_len: usize, comparison_points: usize) -> bool {
    current_len > 0 && current_len < comparison_points
}

/// Compare `current` against `previous`.
///
/// Samples `min(current.len(), comparison_points)` points from
/// `current`. The order of the returned point lists follows the sample,
/// not scan order.
#[allow(clippy::cast_precision_loss)]
pub fn compare_edge_points<R: Rng + ?Sized>(
    previous: &[Point],
    current: &[Point],
    comparison_points: usize,
    tolerance: f64,
    rng: &mut R,
) -> MotionComparison {
    let sample_size = current.len().min(comparison_points);
    if sample_size == 0 {
        return MotionComparison::empty();
    }

    let lookup: HashSet<Point> = previous.iter().copied().collect();
    let mut stable_points = Vec::new();
    let mut moved_points = Vec::new();
    for i in index::sample(rng, current.len(), sample_size) {
        let point = current[i];
        if lookup.contains(&point) {
            stable_points.push(point);
        } else {
            moved_points.push(point);
        }
    }

    let changed_percentage = moved_points.len() as f64 / sample_size as f64 * 100.0;
    MotionComparison {
        changed_percentage,
        motion_detected: changed_percentage / 100.0 >= tolerance,
        low_confidence: is_low_confidence(current.len(), comparison_points),
        stable_points,
        moved_points,
    }
}
