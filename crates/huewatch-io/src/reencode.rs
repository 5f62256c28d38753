//! External crop-and-re-encode of a clip.
//!
//! Crop geometry is validated here, against the source frame size,
//! before anything is handed to the encoder.

use std::time::Duration;

use async_trait::async_trait;
use huewatch_pipeline::{AnalysisError, Dimensions, Rect, RgbaImage};
use image::imageops::{self, FilterType};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::deadline::{self, CollaboratorError};

const SERVICE: &str = "video re-encode";

/// A video encoder that crops and scales a frame stream.
#[async_trait]
pub trait Reencoder: Send {
    /// Crop every frame to `crop` and scale it to `target`.
    async fn reencode(
        &mut self,
        frames: Vec<RgbaImage>,
        crop: Rect,
        target: Dimensions,
    ) -> Result<Vec<RgbaImage>, CollaboratorError>;

    /// Release the encoder's resources. Called after every request.
    async fn terminate(&mut self) {}
}

/// In-process encoder built on `image::imageops`.
#[derive(Debug, Clone, Copy)]
pub struct ImageOpsReencoder {
    /// Resampling filter used for scaling.
    pub filter: FilterType,
}

impl Default for ImageOpsReencoder {
    fn default() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }
}

#[async_trait]
impl Reencoder for ImageOpsReencoder {
    async fn reencode(
        &mut self,
        frames: Vec<RgbaImage>,
        crop: Rect,
        target: Dimensions,
    ) -> Result<Vec<RgbaImage>, CollaboratorError> {
        Ok(frames
            .iter()
            .map(|frame| {
                let cropped =
                    imageops::crop_imm(frame, crop.x, crop.y, crop.width, crop.height).to_image();
                if Dimensions::of(&cropped) == target {
                    cropped
                } else {
                    imageops::resize(&cropped, target.width, target.height, self.filter)
                }
            })
            .collect())
    }
}

/// Validate `crop` and `target`, then re-encode `frames` within
/// `deadline`.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidConfig`] without calling the encoder
/// if the crop is empty or leaves `source`, if `target` is empty, or if
/// a frame is not `source`-sized. Otherwise see [`deadline::race`].
pub async fn reencode_clip<T: Reencoder + ?Sized>(
    reencoder: &mut T,
    frames: Vec<RgbaImage>,
    source: Dimensions,
    crop: Rect,
    target: Dimensions,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<RgbaImage>, AnalysisError> {
    if crop.is_empty() || !crop.fits_within(source) {
        return Err(AnalysisError::InvalidConfig(format!(
            "crop {}x{} at ({}, {}) does not fit a {}x{} source",
            crop.width, crop.height, crop.x, crop.y, source.width, source.height,
        )));
    }
    if target.is_empty() {
        return Err(AnalysisError::InvalidConfig(
            "target dimensions must be non-zero".to_owned(),
        ));
    }
    if let Some(frame) = frames.iter().find(|f| Dimensions::of(f) != source) {
        return Err(AnalysisError::InvalidConfig(format!(
            "frame is {}x{}, source is {}x{}",
            frame.width(),
            frame.height(),
            source.width,
            source.height,
        )));
    }

    info!(frames = frames.len(), ?crop, ?target, "re-encoding clip");
    let outcome = deadline::race(
        SERVICE,
        deadline,
        cancel,
        reencoder.reencode(frames, crop, target),
    )
    .await;
    reencoder.terminate().await;
    outcome
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SOURCE: Dimensions = Dimensions {
        width: 8,
        height: 6,
    };

    fn frames() -> Vec<RgbaImage> {
        (0..3u8)
            .map(|i| RgbaImage::from_pixel(8, 6, image::Rgba([i, 0, 0, 255])))
            .collect()
    }

    /// Encoder that must never be reached.
    struct Unreachable;

    #[async_trait]
    impl Reencoder for Unreachable {
        async fn reencode(
            &mut self,
            _frames: Vec<RgbaImage>,
            _crop: Rect,
            _target: Dimensions,
        ) -> Result<Vec<RgbaImage>, CollaboratorError> {
            Err(CollaboratorError::new("encoder was called"))
        }
    }

    #[tokio::test]
    async fn crop_and_scale() {
        let out = reencode_clip(
            &mut ImageOpsReencoder::default(),
            frames(),
            SOURCE,
            Rect::new(2, 1, 4, 4),
            Dimensions {
                width: 2,
                height: 2,
            },
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|f| f.dimensions() == (2, 2)));
        assert_eq!(out[2].get_pixel(0, 0).0, [2, 0, 0, 255]);
    }

    #[tokio::test]
    async fn crop_outside_source_is_rejected_before_encoding() {
        for crop in [Rect::new(6, 0, 4, 4), Rect::new(0, 0, 0, 4)] {
            let err = reencode_clip(
                &mut Unreachable,
                frames(),
                SOURCE,
                crop,
                SOURCE,
                Duration::from_secs(5),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidConfig(_)), "{crop:?}");
        }
    }

    #[tokio::test]
    async fn mismatched_frame_is_rejected() {
        let mut clip = frames();
        clip.push(RgbaImage::new(4, 4));
        let err = reencode_clip(
            &mut Unreachable,
            clip,
            SOURCE,
            Rect::new(0, 0, 2, 2),
            SOURCE,
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn encoder_failure_is_external() {
        let err = reencode_clip(
            &mut Unreachable,
            frames(),
            SOURCE,
            Rect::new(0, 0, 2, 2),
            SOURCE,
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::ExternalServiceFailure {
                service: "video re-encode".to_owned(),
                message: "encoder was called".to_owned(),
            }
        );
    }
}
