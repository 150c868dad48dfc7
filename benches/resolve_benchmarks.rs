//! Benchmarks for window resolution and the export pipeline.
//!
//! Run with: cargo bench
//!
//! The FFmpeg benchmark requires `tests/fixtures/sample_video.mp4`.

use std::{hint::black_box, path::Path};

use criterion::Criterion;
use ffmpeg_next::util::log::Level as LogLevel;
use reclip::{
    ExportOptions, ExportPipeline, ExportRequest, FileSource, FrameSource, TieBreak, TimeWindow,
    closest_index, resolve_export_range,
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

/// An hour of 200 Hz samples against 30 fps video with jittered spacing.
fn recording_clock() -> (Vec<f64>, Vec<f64>) {
    let global = (0..720_000).map(|i| i as f64 / 200.0).collect();
    let source = (0..108_000)
        .map(|i| i as f64 / 30.0 + if i % 7 == 0 { 0.004 } else { 0.0 })
        .collect();
    (global, source)
}

fn benchmark_resolution(criterion: &mut Criterion) {
    let (global, source) = recording_clock();

    criterion.bench_function("resolve 10 s window in 1 h recording", |bencher| {
        let window = TimeWindow::new(1_800.0, 1_810.0).unwrap();
        bencher.iter(|| resolve_export_range(black_box(&global), black_box(&source), window));
    });

    criterion.bench_function("resolve whole recording", |bencher| {
        let window = TimeWindow::new(0.0, 3_600.0).unwrap();
        bencher.iter(|| resolve_export_range(black_box(&global), black_box(&source), window));
    });

    criterion.bench_function("closest index (later tie-break)", |bencher| {
        bencher.iter(|| closest_index(black_box(&source), black_box(1_234.567), TieBreak::Later));
    });
}

fn benchmark_export(criterion: &mut Criterion) {
    ffmpeg_next::util::log::set_level(LogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    let timestamps = FileSource::open(SAMPLE_VIDEO).unwrap().timestamps().to_vec();
    let first = timestamps[0];
    let out = std::env::temp_dir().join("reclip_bench_scene.mp4");

    let mut group = criterion.benchmark_group("export");
    group.sample_size(10);
    group.bench_function("re-encode first second", |bencher| {
        bencher.iter(|| {
            let request = ExportRequest::new(
                timestamps.clone(),
                SAMPLE_VIDEO,
                &out,
                TimeWindow::new(first, first + 1.0).unwrap(),
            )
            .with_options(ExportOptions::new().with_update_rate(30));
            ExportPipeline::new(request).count()
        });
    });
    group.finish();

    std::fs::remove_file(&out).ok();
}

criterion::criterion_group!(benches, benchmark_resolution, benchmark_export);
criterion::criterion_main!(benches);
