//! FFmpeg-backed source and encoder tests.
//!
//! Tests that need media look for `tests/fixtures/sample_video.mp4` and
//! return early when it is absent.

use std::path::Path;

use reclip::{
    ExportOptions, ExportPipeline, ExportRequest, FileSource, FrameSource, JobState, ReclipError,
    TimeWindow,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

#[test]
fn open_nonexistent_file_fails() {
    let result = FileSource::open("tests/fixtures/does_not_exist.mp4");
    assert!(matches!(result, Err(ReclipError::SourceOpen { .. })));
}

#[test]
fn source_timestamps_are_sorted() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = FileSource::open(path).expect("open source");
    let timestamps = source.timestamps();
    assert!(!timestamps.is_empty());
    assert_eq!(source.frame_count(), timestamps.len());
    assert!(timestamps.windows(2).all(|pair| pair[0] < pair[1]));

    let (width, height) = source.frame_size();
    assert!(width > 0 && height > 0);
}

#[test]
fn seek_then_decode_returns_requested_index() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut source = FileSource::open(path).expect("open source");
    let target = source.frame_count() / 2;
    source.seek_to_index(target).expect("seek");

    let frame = source.next_frame().expect("decode").expect("frame after seek");
    assert_eq!(frame.index, target);
    assert_eq!(frame.timestamp, source.timestamps()[target]);
    assert_eq!(frame.image.dimensions(), source.frame_size());
    assert_eq!(source.current_index(), target + 1);

    source.close();
    assert!(!source.is_open());
    assert!(source.next_frame().expect("closed source").is_none());
}

#[test]
fn seek_past_end_reports_end_of_stream() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut source = FileSource::open(path).expect("open source");
    let count = source.frame_count();
    source.seek_to_index(count + 10).expect("seek");
    assert!(source.next_frame().expect("decode").is_none());
}

#[test]
fn caller_supplied_timestamps_replace_derived_ones() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = FileSource::open(path).expect("open source");
    let count = source.frame_count();
    let custom: Vec<f64> = (0..count).map(|i| 100.0 + i as f64).collect();
    let source = source.with_timestamps(custom.clone());
    assert_eq!(source.timestamps(), custom.as_slice());
}

#[test]
fn export_first_second_with_ffmpeg() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let timestamps = FileSource::open(path)
        .expect("open source")
        .timestamps()
        .to_vec();
    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("scene.mp4");
    let first = timestamps[0];
    let request = ExportRequest::new(
        timestamps,
        path,
        &target,
        TimeWindow::new(first, first + 1.0).unwrap(),
    )
    .with_options(ExportOptions::new().with_thread_count(1));

    let mut pipeline = ExportPipeline::new(request);
    let events: Vec<_> = pipeline.by_ref().collect();
    let last = events.last().expect("terminal event");

    // Skip if the MPEG-4 encoder is not available in this FFmpeg build.
    if pipeline.state() == JobState::Failed && last.status.contains("codec") {
        eprintln!("Skipping: {}", last.status);
        return;
    }

    assert_eq!(pipeline.state(), JobState::Completed, "{events:?}");
    assert!(pipeline.frames_encoded() > 0);
    let size = std::fs::metadata(&target).expect("output exists").len();
    assert!(size > 0, "output file should be non-empty");

    let exported = FileSource::open(&target).expect("reopen export");
    assert_eq!(exported.frame_count(), pipeline.frames_encoded());
    assert!(exported.timestamps()[0].abs() < 1e-3);
}
