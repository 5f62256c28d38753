//! Frame sources: where sampled video frames come from.
//!
//! The session owns one RGBA canvas sized to the source and lends it to
//! [`FrameSource::read_frame`] for every sample. A source seeks to the
//! requested timestamp and overwrites the canvas in place; it never
//! keeps a reference to it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use huewatch_pipeline::{AnalysisError, Dimensions, RgbaImage};
use tracing::debug;

use crate::media::MediaKind;

/// Errors raised while acquiring a frame.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source could not decode the frame at the requested time.
    #[error("failed to decode frame at {time:.3}s: {message}")]
    Decode {
        /// Requested timestamp.
        time: f64,
        /// Decoder message.
        message: String,
    },

    /// A frame file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A frame's size differs from the size the source declared.
    #[error("frame is {actual_width}x{actual_height}, expected {width}x{height}")]
    DimensionMismatch {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
        /// Width of the offending frame.
        actual_width: u32,
        /// Height of the offending frame.
        actual_height: u32,
    },

    /// The source has no frames or the canvas cannot be written.
    #[error("{0}")]
    Unavailable(String),
}

impl From<SourceError> for AnalysisError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unavailable(message) => Self::ContextUnavailable(message),
            other => Self::DecodeFailure(other.to_string()),
        }
    }
}

/// A seekable stream of RGBA frames with a fixed size.
#[async_trait]
pub trait FrameSource: Send {
    /// Size of every frame.
    fn dimensions(&self) -> Dimensions;

    /// Clip length in seconds.
    fn duration_secs(&self) -> f64;

    /// Seek to `time` and write that frame into `canvas`.
    ///
    /// `canvas` always has [`dimensions`](Self::dimensions).
    async fn read_frame(&mut self, time: f64, canvas: &mut RgbaImage) -> Result<(), SourceError>;
}

/// Frame index shown at `time` for a clip of `frame_count` frames at
/// `fps`: `floor(time * fps)`, clamped to the last frame.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn frame_index_at(time: f64, fps: f64, frame_count: usize) -> usize {
    let last = frame_count.saturating_sub(1);
    let raw = (time.max(0.0) * fps).floor();
    if raw.is_finite() && raw < last as f64 {
        raw as usize
    } else {
        last
    }
}

#[allow(clippy::cast_precision_loss)]
fn sequence_duration(frame_count: usize, fps: f64) -> f64 {
    frame_count as f64 / fps
}

fn check_fps(fps: f64) -> Result<(), SourceError> {
    if fps.is_finite() && fps > 0.0 {
        Ok(())
    } else {
        Err(SourceError::Unavailable(format!(
            "source frame rate must be positive, got {fps}"
        )))
    }
}

fn copy_into(frame: &RgbaImage, canvas: &mut RgbaImage) -> Result<(), SourceError> {
    if frame.dimensions() != canvas.dimensions() {
        return Err(SourceError::DimensionMismatch {
            width: canvas.width(),
            height: canvas.height(),
            actual_width: frame.width(),
            actual_height: frame.height(),
        });
    }
    canvas.copy_from_slice(frame.as_raw());
    Ok(())
}

/// Pre-decoded frames held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    frames: Vec<RgbaImage>,
    fps: f64,
    dimensions: Dimensions,
}

impl MemorySource {
    /// Wrap `frames` played back at `fps`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unavailable`] if `frames` is empty or
    /// `fps` is not positive, and [`SourceError::DimensionMismatch`] if
    /// the frames differ in size.
    pub fn new(frames: Vec<RgbaImage>, fps: f64) -> Result<Self, SourceError> {
        check_fps(fps)?;
        let first = frames
            .first()
            .ok_or_else(|| SourceError::Unavailable("no frames supplied".to_owned()))?;
        let dimensions = Dimensions::of(first);
        if let Some(odd) = frames.iter().find(|f| Dimensions::of(f) != dimensions) {
            return Err(SourceError::DimensionMismatch {
                width: dimensions.width,
                height: dimensions.height,
                actual_width: odd.width(),
                actual_height: odd.height(),
            });
        }
        Ok(Self {
            frames,
            fps,
            dimensions,
        })
    }
}

#[async_trait]
impl FrameSource for MemorySource {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    fn duration_secs(&self) -> f64 {
        sequence_duration(self.frames.len(), self.fps)
    }

    async fn read_frame(&mut self, time: f64, canvas: &mut RgbaImage) -> Result<(), SourceError> {
        let index = frame_index_at(time, self.fps, self.frames.len());
        let frame = self
            .frames
            .get(index)
            .ok_or_else(|| SourceError::Unavailable("no frames supplied".to_owned()))?;
        copy_into(frame, canvas)
    }
}

/// A list of image files treated as consecutive frames at a declared
/// rate.
///
/// Files are decoded lazily on each seek; the first file is decoded up
/// front to learn the frame size.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    fps: f64,
    dimensions: Dimensions,
}

impl ImageSequenceSource {
    /// Open `paths` as frames at `fps`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unavailable`] if `paths` is empty or `fps`
    /// is not positive, and a read or decode error if the first frame
    /// cannot be loaded.
    pub async fn open(paths: Vec<PathBuf>, fps: f64) -> Result<Self, SourceError> {
        check_fps(fps)?;
        let first = paths
            .first()
            .ok_or_else(|| SourceError::Unavailable("image sequence is empty".to_owned()))?;
        let dimensions = Dimensions::of(&load(first, 0.0).await?);
        debug!(frames = paths.len(), fps, ?dimensions, "opened image sequence");
        Ok(Self {
            paths,
            fps,
            dimensions,
        })
    }

    /// Open every supported image in `dir`, sorted by file name.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if the directory cannot be listed, and
    /// the errors of [`open`](Self::open).
    pub async fn open_dir(dir: &Path, fps: f64) -> Result<Self, SourceError> {
        let io_err = |source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if matches!(MediaKind::from_path(&path), Ok(MediaKind::Image)) {
                paths.push(path);
            }
        }
        paths.sort();
        Self::open(paths, fps).await
    }

    /// Number of frame files.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.paths.len()
    }

    /// Decode every frame, in order.
    ///
    /// # Errors
    ///
    /// Returns the first read or decode failure, or
    /// [`SourceError::DimensionMismatch`] if a frame differs in size from
    /// the first.
    #[allow(clippy::cast_precision_loss)]
    pub async fn load_all(&self) -> Result<Vec<RgbaImage>, SourceError> {
        let mut frames = Vec::with_capacity(self.paths.len());
        for (index, path) in self.paths.iter().enumerate() {
            let frame = load(path, index as f64 / self.fps).await?;
            if Dimensions::of(&frame) != self.dimensions {
                return Err(SourceError::DimensionMismatch {
                    width: self.dimensions.width,
                    height: self.dimensions.height,
                    actual_width: frame.width(),
                    actual_height: frame.height(),
                });
            }
            frames.push(frame);
        }
        Ok(frames)
    }
}

async fn load(path: &Path, time: f64) -> Result<RgbaImage, SourceError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    huewatch_pipeline::grayscale::decode(&bytes).map_err(|e| SourceError::Decode {
        time,
        message: format!("{}: {e}", path.display()),
    })
}

#[async_trait]
impl FrameSource for ImageSequenceSource {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    fn duration_secs(&self) -> f64 {
        sequence_duration(self.paths.len(), self.fps)
    }

    async fn read_frame(&mut self, time: f64, canvas: &mut RgbaImage) -> Result<(), SourceError> {
        let index = frame_index_at(time, self.fps, self.paths.len());
        let path = self
            .paths
            .get(index)
            .ok_or_else(|| SourceError::Unavailable("image sequence is empty".to_owned()))?;
        let frame = load(path, time).await?;
        copy_into(&frame, canvas)
    }
}
