//! JSON exports.
//!
//! Field names are camelCase so the files match what browser tooling
//! expects. Bulky data (point arrays, pixel buffers) is never exported.

use huewatch_pipeline::cluster;
use huewatch_pipeline::{ExcludedArea, FrameAnalysisResult, MotionFrameAnalysisResult, Rgb};
use serde::Serialize;

/// Errors from the serializers in this crate.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// `serde_json` rejected the value.
    #[error("failed to serialize {what}: {source}")]
    Json {
        /// What was being serialized.
        what: &'static str,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Scalar fields of one motion frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionRecord {
    /// Zero-based sample index.
    pub frame: u32,
    /// Sample timestamp in seconds.
    pub time: f64,
    /// Share of sampled edge points that moved, 0-100.
    pub changed_percentage: f64,
    /// Whether the change reached the configured tolerance.
    pub motion_detected: bool,
    /// The frame had fewer edge points than the requested sample.
    pub low_confidence: bool,
}

impl From<&MotionFrameAnalysisResult> for MotionRecord {
    fn from(result: &MotionFrameAnalysisResult) -> Self {
        Self {
            frame: result.frame,
            time: result.time,
            changed_percentage: result.changed_percentage,
            motion_detected: result.motion_detected,
            low_confidence: result.low_confidence,
        }
    }
}

/// One color result without its visualization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorRecord {
    /// `null` for a still image.
    pub time: Option<f64>,
    /// Representative of the dominant cluster.
    pub dominant_color: Rgb,
    /// `#rrggbb` form of `dominant_color`.
    pub hex: String,
    /// Share of analyzable pixels in the dominant cluster, 0-100.
    pub percentage: f64,
    /// Present only when a minimum coverage was configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_uniform: Option<bool>,
}

impl ColorRecord {
    /// Strip the pixel buffer from `result` and derive the uniformity
    /// verdict when `minimum_coverage` is set.
    #[must_use]
    pub fn new(result: &FrameAnalysisResult, minimum_coverage: Option<f64>) -> Self {
        Self {
            time: result.time,
            dominant_color: result.dominant_color,
            hex: result.dominant_color.to_hex(),
            percentage: result.percentage,
            is_uniform: minimum_coverage.map(|min| cluster::is_uniform(result.percentage, min)),
        }
    }
}

/// Pretty-printed JSON array of [`MotionRecord`]s.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialization fails.
pub fn motion_to_json(results: &[MotionFrameAnalysisResult]) -> Result<String, ExportError> {
    let records: Vec<MotionRecord> = results.iter().map(MotionRecord::from).collect();
    to_pretty("motion results", &records)
}

/// Pretty-printed JSON array of [`ColorRecord`]s.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialization fails.
pub fn color_to_json(
    results: &[FrameAnalysisResult],
    minimum_coverage: Option<f64>,
) -> Result<String, ExportError> {
    let records: Vec<ColorRecord> = results
        .iter()
        .map(|r| ColorRecord::new(r, minimum_coverage))
        .collect();
    to_pretty("color results", &records)
}

/// Exclusion areas as a JSON array the importer accepts back.
///
/// Ids are included; the importer ignores them and assigns fresh ones.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialization fails.
pub fn exclusions_to_json(areas: &[ExcludedArea]) -> Result<String, ExportError> {
    to_pretty("exclusion areas", areas)
}

fn to_pretty<T: Serialize + ?Sized>(what: &'static str, value: &T) -> Result<String, ExportError> {
    serde_json::to_string_pretty(value).map_err(|source| ExportError::Json { what, source })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use huewatch_pipeline::mask::{self, Rect};
    use huewatch_pipeline::{Point, RgbaImage};
    use serde_json::{Value, json};

    use super::*;

    fn motion(frame: u32, pct: f64) -> MotionFrameAnalysisResult {
        MotionFrameAnalysisResult {
            frame,
            time: f64::from(frame) / 15.0,
            changed_percentage: pct,
            motion_detected: pct >= 10.0,
            low_confidence: false,
            stable_points: vec![Point::new(1, 1)],
            moved_points: vec![Point::new(2, 2), Point::new(3, 3)],
        }
    }

    #[test]
    fn motion_export_keeps_only_scalars() {
        let json = motion_to_json(&[motion(0, 100.0), motion(3, 5.0)]).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        let first = value[0].as_object().unwrap();
        let mut keys: Vec<_> = first.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["changedPercentage", "frame", "lowConfidence", "motionDetected", "time"]
        );
        assert_eq!(value[1]["frame"], json!(3));
        assert_eq!(value[1]["motionDetected"], json!(false));
        assert!(!json.contains("stablePoints"));
        assert!(!json.contains("movedPoints"));
    }

    #[test]
    fn empty_motion_run_is_empty_array() {
        let value: Value = serde_json::from_str(&motion_to_json(&[]).unwrap()).unwrap();
        assert_eq!(value, json!([]));
    }

    #[test]
    fn color_export_omits_pixels() {
        let result = FrameAnalysisResult {
            time: None,
            dominant_color: Rgb::new(255, 0, 0),
            percentage: 80.0,
            processed: RgbaImage::new(64, 64),
        };
        let value: Value =
            serde_json::from_str(&color_to_json(std::slice::from_ref(&result), None).unwrap())
                .unwrap();
        assert_eq!(
            value,
            json!([{
                "time": null,
                "dominantColor": {"r": 255, "g": 0, "b": 0},
                "hex": "#ff0000",
                "percentage": 80.0,
            }])
        );

        let with_verdict: Value =
            serde_json::from_str(&color_to_json(&[result], Some(0.9)).unwrap()).unwrap();
        assert_eq!(with_verdict[0]["isUniform"], json!(false));
    }

    #[test]
    fn uniform_verdict_is_inclusive() {
        let result = FrameAnalysisResult {
            time: Some(0.0),
            dominant_color: Rgb::new(0, 0, 0),
            percentage: 80.0,
            processed: RgbaImage::new(1, 1),
        };
        assert_eq!(ColorRecord::new(&result, Some(0.8)).is_uniform, Some(true));
        assert_eq!(ColorRecord::new(&result, Some(0.81)).is_uniform, Some(false));
        assert_eq!(ColorRecord::new(&result, None).is_uniform, None);
    }

    #[test]
    fn exclusions_export_reimports() {
        let areas = vec![
            ExcludedArea::new(4, Rect::new(0, 0, 10, 20)),
            ExcludedArea::new(9, Rect::new(5, 6, 7, 8)),
        ];
        let json = exclusions_to_json(&areas).unwrap();
        let imported = mask::import_areas(&json, &[]).unwrap();
        assert_eq!(imported.len(), 2);
        assert_eq!(imported[0].rect, areas[0].rect);
        assert_eq!(imported[1].rect, areas[1].rect);
        assert_eq!(imported[0].id, 1);
    }
}
