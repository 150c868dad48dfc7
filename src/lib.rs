//! # reclip
//!
//! Cut time-bounded, re-encoded clips out of long video recordings.
//!
//! A recording pairs a source video with a global timestamp sequence that may
//! be spaced differently from the video's own frames. `reclip` resolves a
//! time window against both sequences, decodes exactly the selected frames,
//! runs each one through a pluggable transform (lens undistortion, overlays,
//! ...) and re-encodes the result with fresh presentation timestamps, powered
//! by FFmpeg via the [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next)
//! crate.
//!
//! Exports run as cancellable background tasks that report progress as a
//! stream of `(status, percent)` events, so a host can show status without
//! ever blocking on an export.
//!
//! ## Quick Start
//!
//! ### Run an export in the background
//!
//! ```no_run
//! use reclip::{ExportRequest, ExportTask, TimeWindow};
//!
//! let timestamps = reclip::read_timestamps("recording/world_timestamps.txt".as_ref())?;
//! let request = ExportRequest::new(
//!     timestamps,
//!     "recording/world.mp4",
//!     "export/scene.mp4",
//!     TimeWindow::new(12.5, 20.0)?,
//! );
//!
//! let mut task = ExportTask::start("scene", request)?;
//! for event in task.wait() {
//!     println!("{event}");
//! }
//! # Ok::<(), reclip::ReclipError>(())
//! ```
//!
//! ### Drive the pipeline directly
//!
//! ```no_run
//! use image::imageops;
//! use reclip::{ExportPipeline, ExportRequest, Frame, FrameSource, TimeWindow};
//!
//! let timestamps: Vec<f64> = (0..900).map(|i| i as f64 / 30.0).collect();
//! let request = ExportRequest::new(
//!     timestamps,
//!     "recording/world.mp4",
//!     "export/flipped.mp4",
//!     TimeWindow::new(0.0, 5.0)?,
//! )
//! .with_transform(|_: &dyn FrameSource, frame: &Frame| imageops::flip_vertical(&frame.image));
//!
//! let mut pipeline = ExportPipeline::new(request);
//! while let Some(event) = pipeline.next_event() {
//!     println!("{event}");
//! }
//! println!("{} frames, {:?}", pipeline.frames_encoded(), pipeline.state());
//! # Ok::<(), reclip::ReclipError>(())
//! ```
//!
//! ## Features
//!
//! - **Window resolution** across variable frame rate timestamp sequences
//! - **Frame-accurate seeking**: seeks to the preceding keyframe and decodes
//!   forward
//! - **Per-frame transforms**: any closure over the decoded frame
//! - **Configurable encoding**: codec, bit rate, tolerance, threads, time base
//! - **Progress & cancellation**: throttled events, cooperative
//!   `CancellationToken`, resources released on every exit path
//! - **Orchestration**: export folders named after the recording start,
//!   source discovery, aggregated status for a host UI
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | `ProgressStream` to observe an export from async code via Tokio |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod configuration;
pub mod encoder;
pub mod error;
pub mod exporter;
pub mod ffmpeg;
pub mod pipeline;
pub mod progress;
pub mod recording;
pub mod source;
#[cfg(feature = "async")]
pub mod stream;
pub mod task;
pub mod timestamps;
pub mod transform;

pub use configuration::{ExportOptions, VideoCodec};
pub use encoder::{ClipEncoder, FrameSink};
pub use error::ReclipError;
pub use exporter::{ExportHooks, Exporter, ExporterOptions, Notification};
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use pipeline::{
    ExportPipeline, ExportRequest, FfmpegBackend, MediaBackend, presentation_timestamp,
};
pub use progress::{CancellationToken, JobState, ProgressEvent};
pub use recording::{
    Recording, export_folder_name, find_source_video, read_start_date, read_timestamps,
};
pub use source::{FileSource, Frame, FrameSource};
#[cfg(feature = "async")]
pub use stream::ProgressStream;
pub use task::ExportTask;
pub use timestamps::{
    ExportRange, TieBreak, TimeWindow, closest_index, exact_window, find_closest,
    resolve_export_range,
};
pub use transform::{FrameTransform, IdentityTransform};
