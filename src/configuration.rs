//! Export configuration.
//!
//! [`ExportOptions`] is a builder that threads encoder tuning and progress
//! throttling through an export without widening every signature. A default
//! configuration encodes near-lossless MPEG-4 Part 2 at a 1/65535 s time
//! base, reporting progress every 10 source frames.
//!
//! # Example
//!
//! ```
//! use reclip::{ExportOptions, VideoCodec};
//!
//! let options = ExportOptions::new()
//!     .with_codec(VideoCodec::H264)
//!     .with_bit_rate(40_000_000)
//!     .with_update_rate(25);
//! assert_eq!(options.bit_rate_tolerance(), 2_000_000);
//! ```

use ffmpeg_next::{Rational, codec::Id};

/// Denominator of the default encode time base (1/65535 s).
///
/// MPEG-4 Part 2 caps the time base denominator at 65535, which still gives
/// sub-frame precision for any realistic source frame rate.
pub const DEFAULT_TIME_BASE_DENOMINATOR: i32 = 65_535;

/// Default target bit rate, 150 Mbit/s.
pub const DEFAULT_BIT_RATE: usize = 150_000_000;

/// Default progress throttling interval, in source frames.
pub const DEFAULT_UPDATE_RATE: usize = 10;

/// Supported output video codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoCodec {
    /// MPEG-4 Part 2. The default.
    #[default]
    Mpeg4,
    /// H.264 / AVC.
    H264,
    /// H.265 / HEVC.
    H265,
}

impl VideoCodec {
    pub(crate) fn to_codec_id(self) -> Id {
        match self {
            VideoCodec::Mpeg4 => Id::MPEG4,
            VideoCodec::H264 => Id::H264,
            VideoCodec::H265 => Id::HEVC,
        }
    }

    /// Parse a codec name as accepted on the command line.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "mpeg4" | "mp4v" => Some(VideoCodec::Mpeg4),
            "h264" | "avc" => Some(VideoCodec::H264),
            "h265" | "hevc" => Some(VideoCodec::H265),
            _ => None,
        }
    }
}

/// Settings for one export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub(crate) codec: VideoCodec,
    pub(crate) bit_rate: usize,
    pub(crate) bit_rate_tolerance_divisor: usize,
    pub(crate) thread_count: usize,
    pub(crate) time_base_denominator: i32,
    pub(crate) update_rate: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportOptions {
    /// Create options with the defaults described in the module docs.
    ///
    /// The encoder thread count defaults to the number of logical CPUs minus
    /// one, and never less than one.
    pub fn new() -> Self {
        Self {
            codec: VideoCodec::default(),
            bit_rate: DEFAULT_BIT_RATE,
            bit_rate_tolerance_divisor: 20,
            thread_count: num_cpus::get().saturating_sub(1).max(1),
            time_base_denominator: DEFAULT_TIME_BASE_DENOMINATOR,
            update_rate: DEFAULT_UPDATE_RATE,
        }
    }

    /// Set the output codec.
    #[must_use]
    pub fn with_codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the target bit rate in bits per second.
    #[must_use]
    pub fn with_bit_rate(mut self, bit_rate: usize) -> Self {
        self.bit_rate = bit_rate;
        self
    }

    /// Set the tolerance as a fraction of the bit rate (`bit_rate / divisor`).
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_bit_rate_tolerance_divisor(mut self, divisor: usize) -> Self {
        self.bit_rate_tolerance_divisor = divisor.max(1);
        self
    }

    /// Set the number of encoder threads. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_thread_count(mut self, threads: usize) -> Self {
        self.thread_count = threads.max(1);
        self
    }

    /// Set the encode time base to `1 / denominator` seconds.
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_time_base_denominator(mut self, denominator: i32) -> Self {
        self.time_base_denominator = denominator.max(1);
        self
    }

    /// Report progress every `frames` source frames. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_update_rate(mut self, frames: usize) -> Self {
        self.update_rate = frames.max(1);
        self
    }

    /// Output codec.
    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    /// Target bit rate in bits per second.
    pub fn bit_rate(&self) -> usize {
        self.bit_rate
    }

    /// Allowed bit rate deviation in bits per second.
    pub fn bit_rate_tolerance(&self) -> usize {
        self.bit_rate / self.bit_rate_tolerance_divisor
    }

    /// Encoder thread count.
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Encode time base.
    pub fn time_base(&self) -> Rational {
        Rational::new(1, self.time_base_denominator)
    }

    /// Progress throttling interval, in source frames.
    pub fn update_rate(&self) -> usize {
        self.update_rate
    }
}
