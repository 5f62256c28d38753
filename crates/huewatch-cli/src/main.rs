//! huewatch: command-line front end for color and motion analysis.
//!
//! Still images are analyzed directly. Video input is taken as a
//! directory of frame images played back at `--source-fps`, sampled at
//! the fixed analysis rate.
//!
//! # Usage
//!
//! ```text
//! huewatch color [OPTIONS] <IMAGE>
//! huewatch video-color [OPTIONS] <FRAME_DIR>
//! huewatch motion [OPTIONS] <FRAME_DIR>
//! huewatch prepare --region X,Y,W,H --out <PNG> [OPTIONS] <IMAGE>
//! huewatch crop --crop X,Y,W,H --size WxH --out <DIR> [OPTIONS] <FRAME_DIR>
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default
//! `info`). Results go to stdout.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use huewatch_export::{ExportError, ReportMetadata};
use huewatch_io::raster::{self, RasterError};
use huewatch_io::{
    AnalysisSession, FrameSource, ImageOpsReencoder, ImageSequenceSource, MediaKind, RunState,
    SourceError,
};
use huewatch_pipeline::enhance::{self, Binarization};
use huewatch_pipeline::{AnalysisConfig, AnalysisError, Dimensions, Rect};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Color and motion analysis for still images and short clips.
#[derive(Parser)]
#[command(name = "huewatch", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dominant color of a still image.
    Color {
        /// Path to the input image (PNG, JPEG, BMP, WebP, GIF).
        image_path: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Write the dominant-color visualization to this PNG file.
        #[arg(long)]
        highlight: Option<PathBuf>,
    },

    /// Dominant color of every sampled frame of a clip.
    VideoColor {
        #[command(flatten)]
        sequence: SequenceArgs,

        #[command(flatten)]
        config: ConfigArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Frame-to-frame motion over a clip.
    Motion {
        #[command(flatten)]
        sequence: SequenceArgs,

        #[command(flatten)]
        config: ConfigArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Seed for edge-point sampling. Random when omitted.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Crop, enhance and binarize a region for text recognition.
    Prepare {
        /// Path to the input image.
        image_path: PathBuf,

        /// Region to extract, as `X,Y,WIDTH,HEIGHT`.
        #[arg(long, value_parser = parse_rect)]
        region: Rect,

        /// Contrast adjustment (-255 to 255).
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        contrast: f64,

        /// Black-and-white reduction: `none`, `otsu`, or a fixed level 0-255.
        #[arg(long, default_value = "none", value_parser = parse_binarization)]
        binarize: Binarization,

        /// Destination PNG.
        #[arg(long)]
        out: PathBuf,
    },

    /// Crop and scale every frame of a clip.
    Crop {
        #[command(flatten)]
        sequence: SequenceArgs,

        /// Crop rectangle, as `X,Y,WIDTH,HEIGHT`. Defaults to the whole
        /// frame.
        #[arg(long, value_parser = parse_rect)]
        crop: Option<Rect>,

        /// Output frame size, as `WIDTHxHEIGHT`.
        #[arg(long, value_parser = parse_size)]
        size: Dimensions,

        /// Seconds the encoder may take before the request is abandoned.
        #[arg(long, default_value_t = DEFAULT_ENCODE_DEADLINE_SECS)]
        deadline: u64,

        /// Output directory for the re-encoded frames.
        #[arg(long)]
        out: PathBuf,
    },
}

const DEFAULT_ENCODE_DEADLINE_SECS: u64 = 30;

/// Analysis parameters shared by the analysis subcommands.
#[derive(Args)]
struct ConfigArgs {
    /// Color clustering radius (0-255).
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_COLOR_THRESHOLD)]
    color_threshold: f64,

    /// Coverage ratio (0.0-1.0) a dominant color needs to count as uniform.
    #[arg(long)]
    minimum_coverage: Option<f64>,

    /// Sobel magnitude cutoff for edge points (0-255).
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_EDGE_THRESHOLD)]
    edge_threshold: f64,

    /// Edge points sampled per frame comparison (50-1000).
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_COMPARISON_POINTS)]
    comparison_points: usize,

    /// Changed-point ratio (0.0-1.0) that counts as motion.
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_TOLERANCE)]
    tolerance: f64,

    /// Longest accepted clip, in seconds.
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_MAX_DURATION_SECS)]
    max_duration: f64,

    /// Use the short-clip duration ceiling instead of `--max-duration`.
    #[arg(long)]
    short: bool,

    /// JSON file of excluded areas (`[{"x":..,"y":..,"width":..,"height":..}]`).
    #[arg(long)]
    exclusions: Option<PathBuf>,

    /// Full analysis config as a JSON string.
    ///
    /// When provided, all other parameter flags except `--exclusions`
    /// are ignored. Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

#[derive(Args)]
struct OutputArgs {
    /// Print JSON instead of the tab-separated report.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SequenceArgs {
    /// Directory of frame images, played in file-name order.
    frame_dir: PathBuf,

    /// Playback rate of the frame sequence.
    #[arg(long, default_value_t = 30.0)]
    source_fps: f64,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config JSON: {0}")]
    ConfigJson(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CliError + '_ {
    move |source| CliError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Build an [`AnalysisConfig`] from CLI flags (or `--config-json`).
fn config_from_cli(args: &ConfigArgs) -> Result<AnalysisConfig, CliError> {
    if let Some(json) = &args.config_json {
        return Ok(serde_json::from_str(json)?);
    }
    let max_duration_secs = if args.short {
        AnalysisConfig::SHORT_MAX_DURATION_SECS
    } else {
        args.max_duration
    };
    Ok(AnalysisConfig {
        color_threshold: args.color_threshold,
        minimum_coverage: args.minimum_coverage,
        edge_threshold: args.edge_threshold,
        comparison_points: args.comparison_points,
        tolerance: args.tolerance,
        excluded_areas: Vec::new(),
        max_duration_secs,
    })
}

/// Create a session for `args`, importing the exclusions file if given.
async fn session_from_cli(args: &ConfigArgs) -> Result<AnalysisSession, CliError> {
    let mut session = AnalysisSession::new(config_from_cli(args)?)?;
    if let Some(path) = &args.exclusions {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(io_error(path))?;
        let areas = session.import_exclusions(&json)?;
        info!(count = areas.len(), "imported excluded areas");
    }
    Ok(session)
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("expected X,Y,WIDTH,HEIGHT: {e}"))?;
    match parts[..] {
        [x, y, width, height] => Ok(Rect::new(x, y, width, height)),
        _ => Err(format!("expected 4 comma-separated values, got {}", parts.len())),
    }
}

fn parse_size(s: &str) -> Result<Dimensions, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_owned())?;
    let parse = |v: &str| v.trim().parse::<u32>().map_err(|e| format!("{v:?}: {e}"));
    Ok(Dimensions {
        width: parse(w)?,
        height: parse(h)?,
    })
}

fn parse_binarization(s: &str) -> Result<Binarization, String> {
    match s.to_ascii_lowercase().as_str() {
        "none" => Ok(Binarization::None),
        "otsu" => Ok(Binarization::Otsu),
        level => level
            .parse::<u8>()
            .map(Binarization::Fixed)
            .map_err(|_| format!("expected none, otsu, or 0-255, got {s:?}")),
    }
}

/// Install the global tracing subscriber, writing to stderr.
fn init_tracing() -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| format!("failed to create log filter: {err}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| format!("tracing init error: {err}"))
}

/// Log run progress until the run leaves the running state.
fn watch_progress(mut states: watch::Receiver<RunState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            if let RunState::Running { current, total } = state {
                debug!(current, total, "analyzing");
            } else if state.is_finished() {
                break;
            }
        }
    })
}

/// Cancel the session's current run on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling analysis");
            token.cancel();
        }
    });
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

async fn open_sequence(args: &SequenceArgs) -> Result<ImageSequenceSource, CliError> {
    let source = ImageSequenceSource::open_dir(&args.frame_dir, args.source_fps).await?;
    info!(
        frames = source.frame_count(),
        duration_secs = source.duration_secs(),
        "opened frame sequence"
    );
    Ok(source)
}

async fn run_color(
    image_path: &Path,
    config: &ConfigArgs,
    output: &OutputArgs,
    highlight: Option<&Path>,
) -> Result<String, CliError> {
    MediaKind::from_path(image_path)?.require(MediaKind::Image)?;
    let bytes = tokio::fs::read(image_path)
        .await
        .map_err(io_error(image_path))?;

    let mut session = session_from_cli(config).await?;
    let minimum_coverage = session.config().minimum_coverage;
    let config_json = serde_json::to_string(session.config())?;
    let results = session.analyze_image(&bytes)?;

    if let (Some(path), Some(result)) = (highlight, results.first()) {
        raster::write_png(path, &result.processed).await?;
        eprintln!("Visualization written to {}", path.display());
    }

    if output.json {
        return Ok(huewatch_export::color_to_json(results, minimum_coverage)?);
    }
    let name = display_name(image_path);
    let metadata = ReportMetadata {
        source: Some(&name),
        config_json: Some(&config_json),
    };
    Ok(huewatch_export::color_report(
        results,
        minimum_coverage,
        &metadata,
    ))
}

async fn run_video_color(
    sequence: &SequenceArgs,
    config: &ConfigArgs,
    output: &OutputArgs,
) -> Result<String, CliError> {
    let mut source = open_sequence(sequence).await?;
    let mut session = session_from_cli(config).await?;
    cancel_on_ctrl_c(session.cancel_token());
    let progress = watch_progress(session.subscribe());

    let minimum_coverage = session.config().minimum_coverage;
    let config_json = serde_json::to_string(session.config())?;
    let outcome = session.analyze_video_color(&mut source).await;
    let _ = progress.await;
    let results = outcome?;

    if output.json {
        return Ok(huewatch_export::color_to_json(results, minimum_coverage)?);
    }
    let name = display_name(&sequence.frame_dir);
    let metadata = ReportMetadata {
        source: Some(&name),
        config_json: Some(&config_json),
    };
    Ok(huewatch_export::color_report(
        results,
        minimum_coverage,
        &metadata,
    ))
}

async fn run_motion(
    sequence: &SequenceArgs,
    config: &ConfigArgs,
    output: &OutputArgs,
    seed: Option<u64>,
) -> Result<String, CliError> {
    let mut source = open_sequence(sequence).await?;
    let mut session = session_from_cli(config).await?;
    cancel_on_ctrl_c(session.cancel_token());
    let progress = watch_progress(session.subscribe());

    let rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
    let config_json = serde_json::to_string(session.config())?;
    let outcome = session.analyze_video_motion(&mut source, rng).await;
    let _ = progress.await;
    outcome?;

    let results = session.motion_results();
    if output.json {
        return Ok(huewatch_export::motion_to_json(results)?);
    }
    let name = display_name(&sequence.frame_dir);
    let metadata = ReportMetadata {
        source: Some(&name),
        config_json: Some(&config_json),
    };
    Ok(huewatch_export::motion_report(
        results,
        &session.motion_summary(),
        &metadata,
    ))
}

async fn run_prepare(
    image_path: &Path,
    region: Rect,
    contrast: f64,
    binarize: Binarization,
    out: &Path,
) -> Result<String, CliError> {
    MediaKind::from_path(image_path)?.require(MediaKind::Image)?;
    let bytes = tokio::fs::read(image_path)
        .await
        .map_err(io_error(image_path))?;
    let image = huewatch_pipeline::grayscale::decode(&bytes)?;

    let prepared = enhance::prepare_for_recognition(&image, region, contrast, binarize)?;
    let png = raster::gray_to_png(&prepared)?;
    tokio::fs::write(out, png).await.map_err(io_error(out))?;
    Ok(format!(
        "{}x{} region written to {}",
        prepared.width(),
        prepared.height(),
        out.display()
    ))
}

async fn run_crop(
    sequence: &SequenceArgs,
    crop: Option<Rect>,
    size: Dimensions,
    deadline: Duration,
    out: &Path,
) -> Result<String, CliError> {
    let source = open_sequence(sequence).await?;
    let frames = source.load_all().await?;

    let crop = crop.unwrap_or_else(|| Rect::covering(source.dimensions()));
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());
    let encoded = huewatch_io::reencode::reencode_clip(
        &mut ImageOpsReencoder::default(),
        frames,
        source.dimensions(),
        crop,
        size,
        deadline,
        &cancel,
    )
    .await?;

    tokio::fs::create_dir_all(out).await.map_err(io_error(out))?;
    for (index, frame) in encoded.iter().enumerate() {
        raster::write_png(&out.join(format!("frame-{index:04}.png")), frame).await?;
    }
    Ok(format!(
        "{} frames written to {}",
        encoded.len(),
        out.display()
    ))
}

async fn run(cli: Cli) -> Result<String, CliError> {
    match &cli.command {
        Command::Color {
            image_path,
            config,
            output,
            highlight,
        } => run_color(image_path, config, output, highlight.as_deref()).await,
        Command::VideoColor {
            sequence,
            config,
            output,
        } => run_video_color(sequence, config, output).await,
        Command::Motion {
            sequence,
            config,
            output,
            seed,
        } => run_motion(sequence, config, output, *seed).await,
        Command::Prepare {
            image_path,
            region,
            contrast,
            binarize,
            out,
        } => run_prepare(image_path, *region, *contrast, *binarize, out).await,
        Command::Crop {
            sequence,
            crop,
            size,
            deadline,
            out,
        } => run_crop(sequence, *crop, *size, Duration::from_secs(*deadline), out).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing() {
        eprintln!("Warning: {e}");
    }
    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            println!("{}", output.trim_end());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
