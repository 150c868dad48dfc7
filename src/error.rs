//! Error types for the `reclip` crate.
//!
//! [`ReclipError`] is returned by every fallible operation below the task
//! boundary. Once an export runs inside an [`ExportTask`](crate::ExportTask)
//! errors are no longer returned to the caller; they are folded into the
//! terminal [`ProgressEvent`](crate::ProgressEvent) of the job instead.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `reclip` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReclipError {
    /// The source video could not be opened for decoding.
    #[error("Failed to open source video at {path}: {reason}")]
    SourceOpen {
        /// Path of the source video.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// No source video matching the recording's base name was found.
    #[error("No source video named {base_name}.* found in {directory}")]
    SourceNotFound {
        /// Recording directory that was scanned.
        directory: PathBuf,
        /// Base name the scan looked for.
        base_name: String,
    },

    /// The source file does not contain a video stream.
    #[error("No video stream found in {0}")]
    NoVideoStream(PathBuf),

    /// A frame could not be decoded from the source.
    #[error("Failed to decode video frame: {0}")]
    DecodeError(String),

    /// The output container or encoder could not be set up or written.
    #[error("Video encoding error: {0}")]
    EncodeError(String),

    /// The per-frame transform rejected a frame.
    #[error("Frame transform failed at index {index}: {reason}")]
    TransformError {
        /// Source index of the frame being transformed.
        index: usize,
        /// Reason reported by the transform.
        reason: String,
    },

    /// A time window with start after end, or a non-finite bound.
    #[error("Invalid time window: start ({start}) must not exceed end ({end})")]
    InvalidWindow {
        /// Requested start, in seconds.
        start: f64,
        /// Requested end, in seconds.
        end: f64,
    },

    /// A timestamp file contained a line that is not a number.
    #[error("Invalid timestamp on line {line} of {path}: {value:?}")]
    InvalidTimestamp {
        /// File being parsed.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// Offending text.
        value: String,
    },

    /// The recording metadata file is missing a required key.
    #[error("Recording metadata is missing the {0:?} key")]
    MissingMetadata(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl From<FfmpegError> for ReclipError {
    fn from(error: FfmpegError) -> Self {
        ReclipError::FfmpegError(error.to_string())
    }
}
