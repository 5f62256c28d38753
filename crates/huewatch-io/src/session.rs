//! The analysis session: configuration, run state and results.
//!
//! An [`AnalysisSession`] replaces the page-level globals of a typical
//! analysis UI. It owns the active [`AnalysisConfig`], the results of
//! the last successful run of each kind, and a [`watch`] channel that
//! publishes [`RunState`] after every frame.
//!
//! Runs are strictly sequential: frame `i + 1` is not requested before
//! frame `i` has been analyzed, because motion analysis folds each
//! frame's edge points into the next comparison. The session allocates
//! one RGBA canvas per run and reuses it for every frame.
//!
//! A run either replaces the previous results of its kind or, on any
//! error or cancellation, leaves them untouched.

use huewatch_pipeline::mask::{self, MAX_EXCLUDED_AREAS};
use huewatch_pipeline::sampler::{self, FrameSchedule, MotionSummary, MotionTracker};
use huewatch_pipeline::{
    AnalysisConfig, AnalysisError, ExcludedArea, FrameAnalysisResult, MotionFrameAnalysisResult,
    Rect, RgbaImage,
};
use rand::Rng;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::source::FrameSource;

/// Progress of the current or most recent run.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RunState {
    /// No run has started.
    #[default]
    Idle,
    /// `current` of `total` frames are done.
    Running {
        /// Frames analyzed so far.
        current: u32,
        /// Frames scheduled.
        total: u32,
    },
    /// The last run finished and its results are available.
    Completed,
    /// The last run failed; earlier results are unchanged.
    Failed(AnalysisError),
    /// The last run was cancelled; earlier results are unchanged.
    Cancelled,
}

impl RunState {
    /// Whether a run has ended, successfully or not.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::Cancelled)
    }
}

/// State for one user's analysis work.
#[derive(Debug)]
pub struct AnalysisSession {
    config: AnalysisConfig,
    state: watch::Sender<RunState>,
    cancel: CancellationToken,
    color_results: Vec<FrameAnalysisResult>,
    motion_results: Vec<MotionFrameAnalysisResult>,
}

impl AnalysisSession {
    /// Start a session with `config`.
    ///
    /// # Errors
    ///
    /// Returns the [`AnalysisConfig::validate`] error if `config` is
    /// out of range.
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        let (state, _) = watch::channel(RunState::Idle);
        Ok(Self {
            config,
            state,
            cancel: CancellationToken::new(),
            color_results: Vec::new(),
            motion_results: Vec::new(),
        })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Replace the configuration. Existing results are kept.
    ///
    /// # Errors
    ///
    /// Returns the validation error and keeps the old configuration if
    /// `config` is out of range.
    pub fn set_config(&mut self, config: AnalysisConfig) -> Result<(), AnalysisError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Exclusion areas of the active configuration.
    #[must_use]
    pub fn exclusions(&self) -> &[ExcludedArea] {
        &self.config.excluded_areas
    }

    /// Add one exclusion rectangle with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidExclusionGeometry`] if `rect` is
    /// empty or the session already has the maximum number of areas.
    pub fn add_exclusion(&mut self, rect: Rect) -> Result<ExcludedArea, AnalysisError> {
        if rect.is_empty() {
            return Err(AnalysisError::InvalidExclusionGeometry(
                "area has zero width or height".to_owned(),
            ));
        }
        let areas = &mut self.config.excluded_areas;
        if areas.len() >= MAX_EXCLUDED_AREAS {
            return Err(AnalysisError::InvalidExclusionGeometry(format!(
                "at most {MAX_EXCLUDED_AREAS} areas are allowed"
            )));
        }
        let id = areas.iter().map(|a| a.id).max().map_or(1, |id| id.saturating_add(1));
        let area = ExcludedArea::new(id, rect);
        areas.push(area);
        debug!(id, ?rect, "added exclusion area");
        Ok(area)
    }

    /// Import exclusion areas from JSON, appending to the current ones.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidExclusionGeometry`] and changes
    /// nothing if any entry is malformed or the total would exceed the
    /// limit.
    pub fn import_exclusions(&mut self, json: &str) -> Result<&[ExcludedArea], AnalysisError> {
        let combined = mask::import_areas(json, &self.config.excluded_areas)?;
        info!(
            imported = combined.len() - self.config.excluded_areas.len(),
            "imported exclusion areas"
        );
        self.config.excluded_areas = combined;
        Ok(&self.config.excluded_areas)
    }

    /// Remove the area with `id`. Returns whether one was removed.
    pub fn remove_exclusion(&mut self, id: u32) -> bool {
        let before = self.config.excluded_areas.len();
        self.config.excluded_areas.retain(|a| a.id != id);
        before != self.config.excluded_areas.len()
    }

    /// Remove every exclusion area.
    pub fn clear_exclusions(&mut self) {
        self.config.excluded_areas.clear();
    }

    /// Receiver for run-state updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Current run state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state.borrow().clone()
    }

    /// Token that cancels the current run, or the next one if none is
    /// in progress.
    ///
    /// A cancelled run consumes its token; fetch a new one afterwards.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Results of the last successful color run.
    #[must_use]
    pub fn color_results(&self) -> &[FrameAnalysisResult] {
        &self.color_results
    }

    /// Results of the last successful motion run.
    #[must_use]
    pub fn motion_results(&self) -> &[MotionFrameAnalysisResult] {
        &self.motion_results
    }

    /// Aggregate of [`motion_results`](Self::motion_results).
    #[must_use]
    pub fn motion_summary(&self) -> MotionSummary {
        sampler::summarize_motion(&self.motion_results)
    }

    /// Color analysis of an encoded still image.
    ///
    /// # Errors
    ///
    /// Returns the decode or analysis error; prior results are kept.
    pub fn analyze_image(&mut self, bytes: &[u8]) -> Result<&[FrameAnalysisResult], AnalysisError> {
        info!(bytes = bytes.len(), "starting still image analysis");
        self.state.send_replace(RunState::Running {
            current: 0,
            total: 1,
        });
        let outcome = huewatch_pipeline::process_image(bytes, &self.config);
        self.color_results = vec![self.finish(outcome)?];
        Ok(&self.color_results)
    }

    /// Dominant-color analysis of every sampled frame of `source`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::MediaTooLong`] before reading any frame
    /// if the clip exceeds the configured ceiling, and the first frame
    /// or analysis error otherwise. Prior results are kept.
    pub async fn analyze_video_color<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<&[FrameAnalysisResult], AnalysisError> {
        let outcome = self.run_color(source).await;
        self.color_results = self.finish(outcome)?;
        Ok(&self.color_results)
    }

    /// Edge-based motion analysis of every sampled frame of `source`.
    ///
    /// `rng` drives the point sampling; pass a seeded generator for
    /// reproducible runs.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::MediaTooLong`] before reading any frame
    /// if the clip exceeds the configured ceiling, and the first frame
    /// error otherwise. Prior results are kept.
    pub async fn analyze_video_motion<S: FrameSource + ?Sized, R: Rng>(
        &mut self,
        source: &mut S,
        rng: R,
    ) -> Result<&[MotionFrameAnalysisResult], AnalysisError> {
        let outcome = self.run_motion(source, rng).await;
        self.motion_results = self.finish(outcome)?;
        let summary = self.motion_summary();
        info!(
            frames = summary.frames_analyzed,
            with_motion = summary.frames_with_motion,
            mean_change = summary.mean_changed_percentage,
            "motion analysis complete"
        );
        Ok(&self.motion_results)
    }

    async fn run_color<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
    ) -> Result<Vec<FrameAnalysisResult>, AnalysisError> {
        let (schedule, mut canvas) = self.begin(source, "color")?;
        let total = schedule.total();
        let mut results = Vec::with_capacity(schedule.len());
        for frame in schedule {
            self.acquire(source, frame.time, &mut canvas).await?;
            results.push(sampler::analyze_color_frame(
                &canvas,
                Some(frame.time),
                &self.config,
            )?);
            self.progress(frame.index + 1, total);
        }
        Ok(results)
    }

    async fn run_motion<S: FrameSource + ?Sized, R: Rng>(
        &self,
        source: &mut S,
        rng: R,
    ) -> Result<Vec<MotionFrameAnalysisResult>, AnalysisError> {
        let (schedule, mut canvas) = self.begin(source, "motion")?;
        let total = schedule.total();
        let mut tracker = MotionTracker::new(&self.config, rng);
        let mut results = Vec::with_capacity(schedule.len());
        for frame in schedule {
            self.acquire(source, frame.time, &mut canvas).await?;
            let result = tracker.analyze_frame(frame, &canvas);
            debug!(
                frame = result.frame,
                changed = result.changed_percentage,
                motion = result.motion_detected,
                "analyzed frame"
            );
            results.push(result);
            self.progress(frame.index + 1, total);
        }
        Ok(results)
    }

    /// Check the clip against the session limits, allocate the canvas
    /// and publish `Running { 0, total }`.
    fn begin<S: FrameSource + ?Sized>(
        &self,
        source: &S,
        kind: &str,
    ) -> Result<(FrameSchedule, RgbaImage), AnalysisError> {
        self.config.validate()?;
        let duration = source.duration_secs();
        sampler::check_duration(duration, self.config.max_duration_secs)?;
        let dimensions = source.dimensions();
        if dimensions.is_empty() {
            return Err(AnalysisError::ContextUnavailable(
                "source has zero-sized frames".to_owned(),
            ));
        }

        let schedule = FrameSchedule::for_duration(duration);
        info!(kind, duration, frames = schedule.total(), ?dimensions, "starting video analysis");
        self.progress(0, schedule.total());
        Ok((schedule, RgbaImage::new(dimensions.width, dimensions.height)))
    }

    /// Read the frame at `time` into `canvas` unless cancelled first.
    async fn acquire<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
        time: f64,
        canvas: &mut RgbaImage,
    ) -> Result<(), AnalysisError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(AnalysisError::Cancelled),
            read = source.read_frame(time, canvas) => read.map_err(AnalysisError::from),
        }
    }

    fn progress(&self, current: u32, total: u32) {
        self.state.send_replace(RunState::Running { current, total });
    }

    /// Publish the terminal state for `outcome`.
    fn finish<T>(&mut self, outcome: Result<T, AnalysisError>) -> Result<T, AnalysisError> {
        match &outcome {
            Ok(_) => {
                self.state.send_replace(RunState::Completed);
            }
            Err(AnalysisError::Cancelled) => {
                info!("analysis cancelled");
                self.state.send_replace(RunState::Cancelled);
                self.cancel = CancellationToken::new();
            }
            Err(err) => {
                warn!(error = %err, "analysis failed");
                self.state.send_replace(RunState::Failed(err.clone()));
            }
        }
        outcome
    }
}
