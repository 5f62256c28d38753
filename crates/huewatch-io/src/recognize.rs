//! External text recognition.
//!
//! The OCR engine lives outside this workspace. It receives a prepared
//! grayscale region and must answer within [`RECOGNITION_DEADLINE`].
//! Whatever the outcome, the engine is terminated afterwards so no
//! worker outlives the request.

use std::time::Duration;

use async_trait::async_trait;
use huewatch_pipeline::enhance::{self, Binarization};
use huewatch_pipeline::{AnalysisError, Rect, RgbaImage};
use image::GrayImage;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::deadline::{self, CollaboratorError};

/// How long a recognizer may take for one region.
pub const RECOGNITION_DEADLINE: Duration = Duration::from_secs(5);

const SERVICE: &str = "text recognition";

/// An OCR engine.
#[async_trait]
pub trait TextRecognizer: Send {
    /// Extract the text in `region`.
    async fn recognize(&mut self, region: &GrayImage) -> Result<String, CollaboratorError>;

    /// Release the engine's resources. Called after every request.
    async fn terminate(&mut self);
}

/// Region selection and preprocessing for one recognition request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognitionRequest {
    /// Area of the frame to read.
    pub region: Rect,
    /// Contrast adjustment, -255..=255.
    pub contrast: f64,
    /// Black-and-white reduction applied after the contrast step.
    pub binarization: Binarization,
}

/// Run `recognizer` on an already prepared region.
///
/// # Errors
///
/// See [`deadline::race`].
pub async fn recognize_with_deadline<T: TextRecognizer + ?Sized>(
    recognizer: &mut T,
    region: &GrayImage,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<String, AnalysisError> {
    debug!(
        width = region.width(),
        height = region.height(),
        "starting text recognition"
    );
    let outcome = deadline::race(SERVICE, deadline, cancel, recognizer.recognize(region)).await;
    recognizer.terminate().await;
    outcome
}

/// Prepare `request.region` of `frame` and recognize it within
/// [`RECOGNITION_DEADLINE`].
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidConfig`] if the region does not fit
/// the frame (the recognizer is not started), and otherwise the errors
/// of [`recognize_with_deadline`].
pub async fn recognize_region<T: TextRecognizer + ?Sized>(
    recognizer: &mut T,
    frame: &RgbaImage,
    request: RecognitionRequest,
    cancel: &CancellationToken,
) -> Result<String, AnalysisError> {
    let prepared = enhance::prepare_for_recognition(
        frame,
        request.region,
        request.contrast,
        request.binarization,
    )?;
    recognize_with_deadline(recognizer, &prepared, RECOGNITION_DEADLINE, cancel).await
}
