//! Plain-text reports.
//!
//! Lines beginning with `#` are metadata; the rest is one line per
//! analyzed frame followed by a short summary block. Columns are
//! tab-separated so the body pastes cleanly into a spreadsheet.
//!
//! These are pure functions with no I/O -- they return a `String`.

use std::fmt::Write;

use huewatch_pipeline::cluster;
use huewatch_pipeline::{FrameAnalysisResult, MotionFrameAnalysisResult, MotionSummary};

/// Metadata emitted as `#`-prefixed lines at the top of a report.
///
/// All fields are optional. When present, the corresponding line is
/// emitted.
#[derive(Debug, Clone, Default)]
pub struct ReportMetadata<'a> {
    /// Source media name -- emitted as `# Source: <name>`.
    pub source: Option<&'a str>,

    /// Full `AnalysisConfig` JSON -- emitted as `# Config: <json>`.
    pub config_json: Option<&'a str>,
}

/// Report for a color run (one still image or a sampled clip).
///
/// When `minimum_coverage` is set, each line gains a `uniform` or
/// `mixed` verdict.
#[must_use]
pub fn color_report(
    results: &[FrameAnalysisResult],
    minimum_coverage: Option<f64>,
    metadata: &ReportMetadata<'_>,
) -> String {
    let mut out = header("color", metadata);

    for result in results {
        let time = result
            .time
            .map_or_else(|| "still".to_owned(), |t| format!("{t:.3}s"));
        let _ = write!(
            out,
            "{time}\t{}\t{:.2}%",
            result.dominant_color.to_hex(),
            result.percentage,
        );
        if let Some(min) = minimum_coverage {
            let verdict = if cluster::is_uniform(result.percentage, min) {
                "uniform"
            } else {
                "mixed"
            };
            let _ = write!(out, "\t{verdict}");
        }
        out.push('\n');
    }

    if results.len() > 1 {
        let lowest = results
            .iter()
            .map(|r| r.percentage)
            .fold(f64::INFINITY, f64::min);
        let _ = writeln!(out, "# Frames: {}", results.len());
        let _ = writeln!(out, "# Lowest coverage: {lowest:.2}%");
    }
    out
}

/// Report for a motion run.
///
/// Frames flagged as low confidence are marked with `(low confidence)`.
#[must_use]
pub fn motion_report(
    results: &[MotionFrameAnalysisResult],
    summary: &MotionSummary,
    metadata: &ReportMetadata<'_>,
) -> String {
    let mut out = header("motion", metadata);

    for result in results {
        let flag = if result.motion_detected { "motion" } else { "still" };
        let _ = write!(
            out,
            "{}\t{:.3}s\t{:.2}%\t{flag}",
            result.frame, result.time, result.changed_percentage,
        );
        if result.low_confidence {
            out.push_str("\t(low confidence)");
        }
        out.push('\n');
    }

    let _ = writeln!(out, "# Frames: {}", summary.frames_analyzed);
    let _ = writeln!(out, "# Frames with motion: {}", summary.frames_with_motion);
    let _ = writeln!(out, "# Low confidence: {}", summary.low_confidence_frames);
    let _ = writeln!(
        out,
        "# Mean change: {:.2}%",
        summary.mean_changed_percentage
    );
    let _ = writeln!(
        out,
        "# Peak change: {:.2}%",
        summary.peak_changed_percentage
    );
    out
}

fn header(kind: &str, metadata: &ReportMetadata<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# huewatch {kind} report");
    if let Some(source) = metadata.source {
        for line in source.lines() {
            let _ = writeln!(out, "# Source: {line}");
        }
    }
    if let Some(config_json) = metadata.config_json {
        for line in config_json.lines() {
            let _ = writeln!(out, "# Config: {line}");
        }
    }
    out
}
