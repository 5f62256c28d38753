//! Media classification by MIME type or file extension.

use std::path::Path;

use huewatch_pipeline::AnalysisError;

/// Broad class of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// A single raster image.
    Image,
    /// A clip to be sampled over time.
    Video,
}

impl MediaKind {
    /// Classify a MIME type such as `image/png` or `video/mp4`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::UnsupportedMediaType`] for anything that
    /// is neither `image/*` nor `video/*`.
    pub fn from_mime(mime: &str) -> Result<Self, AnalysisError> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        let top = essence.split('/').next().unwrap_or_default();
        if top.eq_ignore_ascii_case("image") {
            Ok(Self::Image)
        } else if top.eq_ignore_ascii_case("video") {
            Ok(Self::Video)
        } else {
            Err(AnalysisError::UnsupportedMediaType(mime.to_owned()))
        }
    }

    /// Classify a path by its extension.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::UnsupportedMediaType`] for unknown or
    /// missing extensions.
    pub fn from_path(path: &Path) -> Result<Self, AnalysisError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "bmp" | "webp" | "gif" => Ok(Self::Image),
            "mp4" | "m4v" | "mov" | "webm" | "mkv" | "avi" | "ogv" => Ok(Self::Video),
            _ => Err(AnalysisError::UnsupportedMediaType(path.display().to_string())),
        }
    }

    /// Fail unless `self` is `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::UnsupportedMediaType`] naming both kinds.
    pub fn require(self, expected: Self) -> Result<(), AnalysisError> {
        if self == expected {
            Ok(())
        } else {
            Err(AnalysisError::UnsupportedMediaType(format!(
                "expected {expected:?}, got {self:?}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_classes() {
        assert_eq!(MediaKind::from_mime("image/png"), Ok(MediaKind::Image));
        assert_eq!(MediaKind::from_mime("Video/MP4"), Ok(MediaKind::Video));
        assert_eq!(
            MediaKind::from_mime("video/webm; codecs=vp9"),
            Ok(MediaKind::Video)
        );
        assert!(matches!(
            MediaKind::from_mime("application/pdf"),
            Err(AnalysisError::UnsupportedMediaType(_))
        ));
        assert!(MediaKind::from_mime("").is_err());
    }

    #[test]
    fn extensions() {
        assert_eq!(MediaKind::from_path(Path::new("a/b.JPG")), Ok(MediaKind::Image));
        assert_eq!(MediaKind::from_path(Path::new("clip.mov")), Ok(MediaKind::Video));
        assert!(MediaKind::from_path(Path::new("notes.txt")).is_err());
        assert!(MediaKind::from_path(Path::new("README")).is_err());
    }

    #[test]
    fn image_only_tool_rejects_video() {
        assert!(MediaKind::Image.require(MediaKind::Image).is_ok());
        assert!(matches!(
            MediaKind::Video.require(MediaKind::Image),
            Err(AnalysisError::UnsupportedMediaType(_))
        ));
    }
}
