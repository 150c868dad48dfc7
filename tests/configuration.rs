//! ExportOptions, VideoCodec and CancellationToken tests.

use reclip::{CancellationToken, ExportOptions, FfmpegLogLevel, JobState, ProgressEvent, VideoCodec};

// ── ExportOptions builder ────────────────────────────────────────

#[test]
fn options_defaults() {
    let options = ExportOptions::new();
    assert_eq!(options.codec(), VideoCodec::Mpeg4);
    assert_eq!(options.bit_rate(), 150_000_000);
    assert_eq!(options.bit_rate_tolerance(), 7_500_000);
    assert_eq!(options.update_rate(), 10);
    assert_eq!(options.time_base().numerator(), 1);
    assert_eq!(options.time_base().denominator(), 65_535);
    assert!(options.thread_count() >= 1);
    assert_eq!(options, ExportOptions::default());
}

#[test]
fn thread_count_leaves_one_cpu_free() {
    let expected = num_cpus::get().saturating_sub(1).max(1);
    assert_eq!(ExportOptions::new().thread_count(), expected);
}

#[test]
fn options_builders_clamp_zero() {
    let options = ExportOptions::new()
        .with_update_rate(0)
        .with_thread_count(0)
        .with_bit_rate_tolerance_divisor(0)
        .with_time_base_denominator(0);
    assert_eq!(options.update_rate(), 1);
    assert_eq!(options.thread_count(), 1);
    assert_eq!(options.bit_rate_tolerance(), options.bit_rate());
    assert_eq!(options.time_base().denominator(), 1);
}

#[test]
fn tolerance_follows_bit_rate() {
    let options = ExportOptions::new()
        .with_bit_rate(8_000_000)
        .with_bit_rate_tolerance_divisor(4);
    assert_eq!(options.bit_rate_tolerance(), 2_000_000);
}

// ── Codec and log level names ────────────────────────────────────

#[test]
fn codec_aliases() {
    assert_eq!(VideoCodec::parse("mpeg4"), Some(VideoCodec::Mpeg4));
    assert_eq!(VideoCodec::parse("MP4V"), Some(VideoCodec::Mpeg4));
    assert_eq!(VideoCodec::parse("avc"), Some(VideoCodec::H264));
    assert_eq!(VideoCodec::parse("hevc"), Some(VideoCodec::H265));
    assert_eq!(VideoCodec::parse("vp9"), None);
}

#[test]
fn log_level_aliases() {
    assert_eq!(FfmpegLogLevel::parse("warn"), Some(FfmpegLogLevel::Warning));
    assert_eq!(FfmpegLogLevel::parse("QUIET"), Some(FfmpegLogLevel::Quiet));
    assert_eq!(FfmpegLogLevel::parse("trace"), None);
}

// ── Progress primitives ──────────────────────────────────────────

#[test]
fn cancellation_token_is_shared_between_clones() {
    let token = CancellationToken::new();
    let observer = token.clone();
    assert!(!observer.is_cancelled());
    token.cancel();
    assert!(observer.is_cancelled());
}

#[test]
fn progress_event_percent_is_clamped() {
    assert_eq!(ProgressEvent::new("x", 140.0).percent, 100.0);
    assert_eq!(ProgressEvent::new("x", -3.0).percent, 0.0);
    assert_eq!(
        ProgressEvent::new("Converting video", 42.4).to_string(),
        "Converting video (42%)"
    );
}

#[test]
fn terminal_states() {
    assert!(!JobState::Pending.is_terminal());
    assert!(!JobState::Running.is_terminal());
    assert!(JobState::Completed.is_terminal());
    assert!(JobState::Failed.is_terminal());
    assert!(JobState::Cancelled.is_terminal());
}
