//! Dominant-color clustering.
//!
//! A single greedy pass in scan order (not k-means). Each analyzable
//! pixel joins the first existing cluster whose representative lies
//! strictly closer than the threshold, or founds a new cluster.
//!
//! Representatives are the founding pixel's color and never move. The
//! result therefore depends on scan order and is not an optimal
//! partition; downstream threshold tuning is calibrated against exactly
//! this behavior, so it is kept as is.

use serde::{Deserialize, Serialize};

use crate::mask::ExclusionMask;
use crate::types::{AnalysisError, Rgb, RgbaImage, is_opaque};

/// A group of similar pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorCluster {
    /// Color of the pixel that founded the cluster.
    pub representative: Rgb,
    /// Number of pixels assigned.
    pub count: u64,
}

/// Every cluster formed by one pass, in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Clusters in the order they were founded.
    pub clusters: Vec<ColorCluster>,
    /// Pixels that were neither transparent nor excluded.
    pub analyzable_pixels: u64,
}

impl ClusterSummary {
    /// The largest cluster; ties go to the one founded first.
    #[must_use]
    pub fn dominant(&self) -> Option<&ColorCluster> {
        self.clusters
            .iter()
            .reduce(|best, c| if c.count > best.count { c } else { best })
    }
}

/// The dominant cluster and its share of the analyzable pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DominantColor {
    /// Representative of the dominant cluster.
    pub color: Rgb,
    /// Pixels in the dominant cluster.
    pub count: u64,
    /// `count / analyzable_pixels * 100`.
    pub percentage: f64,
    /// Pixels that took part in clustering.
    pub analyzable_pixels: u64,
    /// How many clusters the pass formed.
    pub cluster_count: usize,
}

/// Whether a dominant color covering `percentage` (0-100) of the
/// analyzable pixels reaches `minimum_coverage` (0.0-1.0).
///
/// This is a caller-side verdict; the pipeline itself only reports
/// the percentage.
#[must_use]
pub fn is_uniform(percentage: f64, minimum_coverage: f64) -> bool {
    percentage / 100.0 >= minimum_coverage
}

/// Group the analyzable pixels of `image` by RGB distance.
///
/// Transparent pixels (alpha below [`ALPHA_CUTOFF`](crate::types::ALPHA_CUTOFF))
/// and excluded pixels are skipped and not counted.
#[must_use = "returns the cluster summary"]
pub fn cluster_colors(image: &RgbaImage, threshold: f64, mask: ExclusionMask<'_>) -> ClusterSummary {
    let mut summary = ClusterSummary::default();
    for (x, y, pixel) in image.enumerate_pixels() {
        if !is_opaque(pixel) || mask.is_excluded(x, y) {
            continue;
        }
        summary.analyzable_pixels += 1;

        let color = Rgb::from_rgba(pixel);
        match summary
            .clusters
            .iter_mut()
            .find(|c| c.representative.is_within(color, threshold))
        {
            Some(cluster) => cluster.count += 1,
            None => summary.clusters.push(ColorCluster {
                representative: color,
                count: 1,
            }),
        }
    }
    summary
}

/// Pick the dominant cluster and compute its coverage.
///
/// # Errors
///
/// Returns [`AnalysisError::NoAnalyzableContent`] if the pass formed no
/// clusters (every pixel transparent or excluded).
#[allow(clippy::cast_precision_loss)]
pub fn dominant_color(summary: &ClusterSummary) -> Result<DominantColor, AnalysisError> {
    let cluster = summary.dominant().ok_or(AnalysisError::NoAnalyzableContent)?;
    let denominator = summary.analyzable_pixels.max(1);
    let percentage = (cluster.count as f64 / denominator as f64 * 100.0).clamp(0.0, 100.0);
    Ok(DominantColor {
        color: cluster.representative,
        count: cluster.count,
        percentage,
        analyzable_pixels: summary.analyzable_pixels,
        cluster_count: summary.clusters.len(),
    })
}

/// Copy `image`, painting every analyzable pixel within `threshold` of
/// `color` pure red.
///
/// Transparent and excluded pixels are left untouched so the overlay
/// only marks what the clustering actually looked at.
#[must_use = "returns the highlighted image"]
pub fn highlight_color(
    image: &RgbaImage,
    color: Rgb,
    threshold: f64,
    mask: ExclusionMask<'_>,
) -> RgbaImage {
    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        if !is_opaque(pixel) || mask.is_excluded(x, y) {
            continue;
        }
        if color.is_within(Rgb::from_rgba(pixel), threshold) {
            *pixel = image::Rgba([Rgb::RED.r, Rgb::RED.g, Rgb::RED.b, 255]);
        }
    }
    out
}
