//! Integration test: write a short image sequence to disk, open it as a
//! frame source, and run both video analyses through a session.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;

use huewatch_io::raster::write_png;
use huewatch_io::{AnalysisSession, FrameSource, ImageSequenceSource, RunState};
use huewatch_pipeline::{AnalysisConfig, AnalysisError, Rgb, RgbaImage};
use rand::SeedableRng;
use rand::rngs::StdRng;

const SOURCE_FPS: f64 = 10.0;

/// Dark 48x32 frame with an 8x8 white square starting at `left`.
fn frame(left: u32) -> RgbaImage {
    RgbaImage::from_fn(48, 32, |x, y| {
        if (left..left + 8).contains(&x) && (10..18).contains(&y) {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([20, 20, 30, 255])
        }
    })
}

async fn write_sequence(name: &str, count: u32) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("huewatch-{name}-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    for i in 0..count {
        let path = dir.join(format!("frame-{i:03}.png"));
        write_png(&path, &frame(4 + i * 3)).await.unwrap();
    }
    // Non-image files in the directory are ignored.
    tokio::fs::write(dir.join("notes.txt"), b"ignored").await.unwrap();
    dir
}

/// Source frame shown at sample `i` (sampled at 15 fps).
fn source_index(i: u32) -> u32 {
    i * 10 / 15
}

#[tokio::test]
async fn moving_square_sequence() {
    let dir = write_sequence("moving", 10).await;
    let mut source = ImageSequenceSource::open_dir(&dir, SOURCE_FPS)
        .await
        .expect("sequence should open");
    assert!((source.duration_secs() - 1.0).abs() < f64::EPSILON);

    let mut session = AnalysisSession::new(AnalysisConfig::default()).unwrap();
    let mut states = session.subscribe();

    let motion = session
        .analyze_video_motion(&mut source, StdRng::seed_from_u64(42))
        .await
        .expect("motion run should succeed")
        .to_vec();
    assert_eq!(motion.len(), 15);
    // The first sample has no predecessor.
    assert!(motion[0].low_confidence);
    assert!(motion[0].changed_percentage.abs() < f64::EPSILON);
    assert!(!motion[0].motion_detected);
    for i in 1..15u32 {
        let result = &motion[i as usize];
        assert_eq!(result.frame, i);
        let moved = source_index(i) != source_index(i - 1);
        assert_eq!(result.motion_detected, moved, "sample {i}");
        if !moved {
            assert!(result.changed_percentage.abs() < f64::EPSILON);
        }
    }
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), RunState::Completed);

    let color = session
        .analyze_video_color(&mut source)
        .await
        .expect("color run should succeed");
    assert_eq!(color.len(), 15);
    let expected = (48.0 * 32.0 - 64.0) / (48.0 * 32.0) * 100.0;
    for result in color {
        assert_eq!(result.dominant_color, Rgb::new(20, 20, 30));
        assert!((result.percentage - expected).abs() < 1e-9);
    }

    // Motion results survive the color run.
    assert_eq!(session.motion_results().len(), 15);
    assert_eq!(session.motion_summary().frames_analyzed, 15);

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn corrupt_frame_aborts_the_run() {
    let dir = write_sequence("corrupt", 4).await;
    tokio::fs::write(dir.join("frame-002.png"), b"not a png").await.unwrap();
    let mut source = ImageSequenceSource::open_dir(&dir, 4.0).await.unwrap();

    let mut session = AnalysisSession::new(AnalysisConfig::default()).unwrap();
    let err = session
        .analyze_video_motion(&mut source, StdRng::seed_from_u64(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::DecodeFailure(_)), "{err}");
    assert!(session.motion_results().is_empty());
    assert!(matches!(session.state(), RunState::Failed(_)));

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}
