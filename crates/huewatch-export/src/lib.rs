//! huewatch-export: Pure result serializers (sans-IO)
//!
//! Converts analysis results into shareable formats: JSON exports
//! (motion timelines without point arrays, color timelines without
//! pixel buffers, exclusion areas) and a plain-text report.

pub mod json;
pub mod report;

pub use json::{
    ColorRecord, ExportError, MotionRecord, color_to_json, exclusions_to_json, motion_to_json,
};
pub use report::{ReportMetadata, color_report, motion_report};
