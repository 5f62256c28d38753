//! Exclusion mask: rectangles whose pixels every stage ignores.
//!
//! Areas are axis-aligned, half-open rectangles in source-pixel
//! coordinates. A pixel is excluded if ANY area contains it. A session
//! holds at most [`MAX_EXCLUDED_AREAS`] areas.
//!
//! Areas can be imported from JSON: either an array of objects or a
//! single object, each carrying numeric `x`, `y`, `width`, `height`.
//! One malformed entry rejects the whole document.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{AnalysisError, Dimensions};

/// Most exclusion areas a single session accepts.
pub const MAX_EXCLUDED_AREAS: usize = 5;

/// An axis-aligned rectangle covering `x..x+width` by `y..y+height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge (inclusive).
    pub x: u32,
    /// Top edge (inclusive).
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle covering a whole image.
    #[must_use]
    pub const fn covering(dimensions: Dimensions) -> Self {
        Self::new(0, 0, dimensions.width, dimensions.height)
    }

    /// Returns `true` if the rectangle has no area.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge. Widened so `x + width` cannot overflow.
    const fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive bottom edge.
    const fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Returns `true` if `(px, py)` lies inside the rectangle.
    #[must_use]
    pub const fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && (px as u64) < self.right() && py >= self.y && (py as u64) < self.bottom()
    }

    /// Returns `true` if the rectangle lies entirely inside an image of
    /// the given dimensions.
    #[must_use]
    pub const fn fits_within(&self, dimensions: Dimensions) -> bool {
        self.right() <= dimensions.width as u64 && self.bottom() <= dimensions.height as u64
    }

}

/// A user-drawn exclusion rectangle.
///
/// `id` is unique within a session and carries no meaning for the
/// analysis itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedArea {
    /// Session-unique identifier.
    pub id: u32,
    /// Covered pixels.
    #[serde(flatten)]
    pub rect: Rect,
}

impl ExcludedArea {
    /// Create a new area.
    #[must_use]
    pub const fn new(id: u32, rect: Rect) -> Self {
        Self { id, rect }
    }
}

/// Borrowed view over the active exclusion areas.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExclusionMask<'a> {
    areas: &'a [ExcludedArea],
}

impl<'a> ExclusionMask<'a> {
    /// A mask that excludes nothing.
    pub const NONE: ExclusionMask<'static> = ExclusionMask { areas: &[] };

    /// Wrap a slice of areas.
    #[must_use]
    pub const fn new(areas: &'a [ExcludedArea]) -> Self {
        Self { areas }
    }

    /// Returns `true` if any area contains `(x, y)`.
    #[must_use]
    pub fn is_excluded(&self, x: u32, y: u32) -> bool {
        self.areas.iter().any(|area| area.rect.contains(x, y))
    }
}

/// Parse exclusion areas from JSON and append them to `existing`.
///
/// Accepts an array of objects or a single object. Each object must
/// carry non-negative numeric `x`, `y` and positive numeric `width`,
/// `height`; fractional values are rounded to the nearest pixel. New
/// areas get ids continuing after the largest existing id.
///
/// Returns the combined list. On any error nothing is appended.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidExclusionGeometry`] if the text is
/// not JSON, an entry is not an object, a field is missing or not a
/// number, a size rounds to zero, or the combined list would exceed
/// [`MAX_EXCLUDED_AREAS`].
pub fn import_areas(
    json: &str,
    existing: &[ExcludedArea],
) -> Result<Vec<ExcludedArea>, AnalysisError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| AnalysisError::InvalidExclusionGeometry(format!("malformed JSON: {e}")))?;

    let entries = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(AnalysisError::InvalidExclusionGeometry(format!(
                "expected an object or an array of objects, got {}",
                json_kind(&other),
            )));
        }
    };

    let total = existing.len() + entries.len();
    if total > MAX_EXCLUDED_AREAS {
        return Err(AnalysisError::InvalidExclusionGeometry(format!(
            "at most {MAX_EXCLUDED_AREAS} areas are allowed, import would make {total}",
        )));
    }

    let rects = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_rect(index, entry))
        .collect::<Result<Vec<_>, _>>()?;

    let mut next_id = existing.iter().map(|a| a.id).max().map_or(1, |id| id.saturating_add(1));
    let mut combined = existing.to_vec();
    for rect in rects {
        combined.push(ExcludedArea::new(next_id, rect));
        next_id = next_id.saturating_add(1);
    }
    Ok(combined)
}

fn parse_rect(index: usize, entry: &Value) -> Result<Rect, AnalysisError> {
    let Value::Object(fields) = entry else {
        return Err(AnalysisError::InvalidExclusionGeometry(format!(
            "entry {index} is {}, expected an object",
            json_kind(entry),
        )));
    };

    let field = |name: &str| -> Result<u32, AnalysisError> {
        let raw = fields.get(name).ok_or_else(|| {
            AnalysisError::InvalidExclusionGeometry(format!("entry {index} is missing `{name}`"))
        })?;
        let number = raw.as_f64().ok_or_else(|| {
            AnalysisError::InvalidExclusionGeometry(format!(
                "entry {index}: `{name}` must be a number, got {}",
                json_kind(raw),
            ))
        })?;
        to_pixel(number).ok_or_else(|| {
            AnalysisError::InvalidExclusionGeometry(format!(
                "entry {index}: `{name}` must be a non-negative pixel coordinate, got {number}",
            ))
        })
    };

    let rect = Rect::new(field("x")?, field("y")?, field("width")?, field("height")?);
    if rect.is_empty() {
        return Err(AnalysisError::InvalidExclusionGeometry(format!(
            "entry {index} has zero width or height",
        )));
    }
    Ok(rect)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_pixel(value: f64) -> Option<u32> {
    let rounded = value.round();
    // The range check makes the cast exact.
    (rounded.is_finite() && (0.0..=f64::from(u32::MAX)).contains(&rounded))
        .then(|| rounded as u32)
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
