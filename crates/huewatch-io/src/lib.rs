//! huewatch-io: Host-side collaborators and the async analysis session.
//!
//! Handles frame acquisition from seekable sources, the deadline and
//! cancellation race around external services (text recognition,
//! re-encoding), PNG output, and the [`AnalysisSession`] that drives
//! the pure `huewatch-pipeline` over sampled video frames.

pub mod deadline;
pub mod media;
pub mod raster;
pub mod recognize;
pub mod reencode;
pub mod session;
pub mod source;

pub use deadline::CollaboratorError;
pub use media::MediaKind;
pub use recognize::{RECOGNITION_DEADLINE, RecognitionRequest, TextRecognizer};
pub use reencode::{ImageOpsReencoder, Reencoder};
pub use session::{AnalysisSession, RunState};
pub use source::{FrameSource, ImageSequenceSource, MemorySource, SourceError};
