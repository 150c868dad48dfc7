//! The windowed re-encode pipeline.
//!
//! [`ExportPipeline`] turns an [`ExportRequest`] into a lazy sequence of
//! [`ProgressEvent`]s. Each call to [`next_event`](ExportPipeline::next_event)
//! advances the export until the next event is due:
//!
//! 1. A liveness event at 0.1%.
//! 2. The source is opened and the time window resolved to an
//!    [`ExportRange`]. A source that fails to open ends the job with a 0%
//!    event; an empty range ends it at 100% without creating an output file.
//! 3. The output is created, the source seeks to the range start, and frames
//!    are decoded, transformed and encoded until the range end or end of
//!    stream. Throttled events report progress in `[10, 100]`.
//! 4. The encoder is flushed, both ends are closed, and a terminal event
//!    reports completion at exactly 100%.
//!
//! Presentation timestamps are re-based on the first exported frame, so every
//! clip starts at pts 0 whatever its offset into the recording.
//!
//! Errors never escape the pipeline: they become the terminal event of the
//! job. A [`CancellationToken`] is checked before every frame; once it fires
//! the pipeline releases the decoder and output and yields nothing further.
//!
//! # Example
//!
//! ```no_run
//! use reclip::{ExportPipeline, ExportRequest, TimeWindow};
//!
//! let timestamps: Vec<f64> = (0..300).map(|i| i as f64 / 30.0).collect();
//! let request = ExportRequest::new(
//!     timestamps,
//!     "recording/world.mp4",
//!     "export/scene.mp4",
//!     TimeWindow::new(2.0, 4.0)?,
//! );
//!
//! for event in ExportPipeline::new(request) {
//!     println!("{event}");
//! }
//! # Ok::<(), reclip::ReclipError>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::configuration::ExportOptions;
use crate::encoder::{ClipEncoder, FrameSink};
use crate::error::ReclipError;
use crate::progress::{CancellationToken, JobState, ProgressEvent, ProgressThrottle};
use crate::source::{FileSource, FrameSource};
use crate::timestamps::{ExportRange, TimeWindow, resolve_export_range};
use crate::transform::{FrameTransform, IdentityTransform};

/// Status line while frames are being converted.
pub const STATUS_CONVERTING: &str = "Converting video";
/// Status line of a successful export.
pub const STATUS_COMPLETED: &str = "Converting video completed";
/// Status line when the source video cannot be opened.
pub const STATUS_SOURCE_FAILED: &str = "Converting scene video failed";
/// Status line when the window selects no source frames.
pub const STATUS_NOTHING_TO_EXPORT: &str = "Nothing to export in the selected range";

/// Percent of the first liveness event.
const LIVENESS_PERCENT: f64 = 0.1;

/// Opens the decode and encode ends of an export.
///
/// [`FfmpegBackend`] is the production implementation; alternative backends
/// let the pipeline run against synthetic media.
pub trait MediaBackend: Send + Sync {
    /// Open the source video at `path`.
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>, ReclipError>;

    /// Create the output file at `path` for `width`×`height` frames.
    fn open_sink(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        options: &ExportOptions,
    ) -> Result<Box<dyn FrameSink>, ReclipError>;
}

/// Decodes and encodes with FFmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl MediaBackend for FfmpegBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>, ReclipError> {
        Ok(Box::new(FileSource::open(path)?))
    }

    fn open_sink(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        options: &ExportOptions,
    ) -> Result<Box<dyn FrameSink>, ReclipError> {
        Ok(Box::new(ClipEncoder::create(path, width, height, options)?))
    }
}

/// Everything one export needs.
///
/// Built with [`ExportRequest::new`] and refined with the `with_*` methods.
/// The request is [`Send`] so it can be handed to a worker thread; the
/// decoder and encoder are only created once the pipeline runs there.
pub struct ExportRequest {
    pub(crate) global_timestamps: Arc<[f64]>,
    pub(crate) source_path: Option<PathBuf>,
    pub(crate) target_path: PathBuf,
    pub(crate) window: TimeWindow,
    pub(crate) transform: Box<dyn FrameTransform>,
    pub(crate) options: ExportOptions,
    pub(crate) backend: Arc<dyn MediaBackend>,
}

impl ExportRequest {
    /// Export the frames of `source_path` that fall inside `window`, as judged
    /// by the recording's `global_timestamps`, into `target_path`.
    ///
    /// Defaults: [`IdentityTransform`], [`ExportOptions::default`],
    /// [`FfmpegBackend`].
    pub fn new(
        global_timestamps: impl Into<Arc<[f64]>>,
        source_path: impl Into<PathBuf>,
        target_path: impl Into<PathBuf>,
        window: TimeWindow,
    ) -> Self {
        Self {
            global_timestamps: global_timestamps.into(),
            source_path: Some(source_path.into()),
            target_path: target_path.into(),
            window,
            transform: Box::new(IdentityTransform),
            options: ExportOptions::default(),
            backend: Arc::new(FfmpegBackend),
        }
    }

    /// A request whose source video could not be located.
    ///
    /// Running it yields the same terminal failure event as a source that
    /// cannot be opened.
    pub(crate) fn without_source(
        global_timestamps: impl Into<Arc<[f64]>>,
        target_path: impl Into<PathBuf>,
        window: TimeWindow,
    ) -> Self {
        Self {
            source_path: None,
            ..Self::new(global_timestamps, PathBuf::new(), target_path, window)
        }
    }

    /// Apply `transform` to every frame before encoding.
    #[must_use]
    pub fn with_transform(mut self, transform: impl FrameTransform + 'static) -> Self {
        self.transform = Box::new(transform);
        self
    }

    /// Apply an already boxed transform.
    #[must_use]
    pub fn with_boxed_transform(mut self, transform: Box<dyn FrameTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Use custom export options.
    #[must_use]
    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a custom media backend.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn MediaBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Requested time window.
    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Output file path.
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }
}

/// Convert a source timestamp into output ticks relative to `origin`.
///
/// The tick count is truncated toward zero, matching how a fractional time
/// base conversion rounds.
pub fn presentation_timestamp(timestamp: f64, origin: f64, time_base_denominator: i32) -> i64 {
    ((timestamp - origin) * time_base_denominator as f64) as i64
}

/// Open decoder and encoder for the range being exported.
struct Session {
    source: Box<dyn FrameSource>,
    sink: Box<dyn FrameSink>,
    range: ExportRange,
    throttle: ProgressThrottle,
    origin: Option<f64>,
}

impl Session {
    fn release(&mut self) {
        self.sink.close();
        self.source.close();
    }
}

enum Stage {
    Start,
    Open,
    Encode(Box<Session>),
    Done,
}

enum Step {
    Continue,
    Report(f64),
    EndOfRange,
}

/// Lazily runs one export, one [`ProgressEvent`] at a time.
///
/// Also usable as an [`Iterator`] over its events.
pub struct ExportPipeline {
    request: ExportRequest,
    stage: Stage,
    state: JobState,
    cancellation: Option<CancellationToken>,
    range: Option<ExportRange>,
    frames_encoded: usize,
    packets_written: usize,
}

impl ExportPipeline {
    /// Create a pipeline for `request`. Nothing is opened until the first
    /// call to [`next_event`](ExportPipeline::next_event).
    pub fn new(request: ExportRequest) -> Self {
        Self {
            request,
            stage: Stage::Start,
            state: JobState::Pending,
            cancellation: None,
            range: None,
            frames_encoded: 0,
            packets_written: 0,
        }
    }

    /// Stop at the next frame boundary once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Current job state.
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Export range resolved from the window, once known.
    pub fn range(&self) -> Option<ExportRange> {
        self.range
    }

    /// Number of frames handed to the encoder so far.
    pub fn frames_encoded(&self) -> usize {
        self.frames_encoded
    }

    /// Number of packets muxed into the output so far.
    pub fn packets_written(&self) -> usize {
        self.packets_written
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    /// Advance the export and return its next event, or `None` once the job
    /// has finished or been cancelled.
    pub fn next_event(&mut self) -> Option<ProgressEvent> {
        loop {
            if self.is_cancelled() && !matches!(self.stage, Stage::Done) {
                self.abort(JobState::Cancelled);
                log::info!("Export to {} cancelled", self.request.target_path.display());
                return None;
            }

            match std::mem::replace(&mut self.stage, Stage::Done) {
                Stage::Start => {
                    self.state = JobState::Running;
                    self.stage = Stage::Open;
                    return Some(ProgressEvent::new(STATUS_CONVERTING, LIVENESS_PERCENT));
                }
                Stage::Open => match self.open_session() {
                    Ok(Some(session)) => self.stage = Stage::Encode(Box::new(session)),
                    Ok(None) => {
                        self.state = JobState::Completed;
                        return Some(ProgressEvent::new(STATUS_NOTHING_TO_EXPORT, 100.0));
                    }
                    Err(event) => {
                        self.state = JobState::Failed;
                        return Some(event);
                    }
                },
                Stage::Encode(mut session) => match self.step(&mut session) {
                    Ok(Step::Continue) => self.stage = Stage::Encode(session),
                    Ok(Step::Report(percent)) => {
                        self.stage = Stage::Encode(session);
                        return Some(ProgressEvent::new(STATUS_CONVERTING, percent));
                    }
                    Ok(Step::EndOfRange) => return Some(self.complete(*session)),
                    Err(error) => {
                        session.release();
                        return Some(self.fail(&error));
                    }
                },
                Stage::Done => return None,
            }
        }
    }

    /// Open the source, resolve the range and create the output.
    ///
    /// `Ok(None)` means the window selects no frames.
    fn open_session(&mut self) -> Result<Option<Session>, ProgressEvent> {
        let request = &self.request;
        let Some(source_path) = request.source_path.as_deref() else {
            log::warn!("No source video for export to {}", request.target_path.display());
            return Err(ProgressEvent::new(STATUS_SOURCE_FAILED, 0.0));
        };

        let mut source = match request.backend.open_source(source_path) {
            Ok(source) => source,
            Err(error) => {
                log::warn!("Cannot open source video: {error}");
                return Err(ProgressEvent::new(STATUS_SOURCE_FAILED, 0.0));
            }
        };

        let Some(range) =
            resolve_export_range(&request.global_timestamps, source.timestamps(), request.window)
        else {
            log::info!("Window {} selects no source frames", request.window);
            source.close();
            return Ok(None);
        };
        self.range = Some(range);

        let (width, height) = source.frame_size();
        let mut sink = match request
            .backend
            .open_sink(&request.target_path, width, height, &request.options)
        {
            Ok(sink) => sink,
            Err(error) => {
                source.close();
                return Err(self.fail(&error));
            }
        };
        if let Err(error) = source.seek_to_index(range.start) {
            sink.close();
            source.close();
            return Err(self.fail(&error));
        }

        log::info!(
            "Exporting frames {range} of {} to {}",
            source_path.display(),
            self.request.target_path.display(),
        );

        Ok(Some(Session {
            source,
            sink,
            range,
            throttle: ProgressThrottle::new(range.start, range.end, self.request.options.update_rate()),
            origin: None,
        }))
    }

    /// Decode, transform and encode a single frame.
    fn step(&mut self, session: &mut Session) -> Result<Step, ReclipError> {
        let Some(frame) = session.source.next_frame()? else {
            log::debug!("End of stream after {} frames", self.frames_encoded);
            return Ok(Step::EndOfRange);
        };
        if frame.index > session.range.end {
            return Ok(Step::EndOfRange);
        }

        let origin = *session.origin.get_or_insert(frame.timestamp);
        let image = self
            .request
            .transform
            .apply(session.source.as_ref(), &frame)?;
        let pts = presentation_timestamp(
            frame.timestamp,
            origin,
            self.request.options.time_base_denominator,
        );

        self.packets_written += session.sink.write_frame(&image, pts)?;
        self.frames_encoded += 1;

        Ok(match session.throttle.observe(session.source.current_index()) {
            Some(percent) => Step::Report(percent),
            None => Step::Continue,
        })
    }

    fn complete(&mut self, mut session: Session) -> ProgressEvent {
        let flushed = session.sink.finish();
        session.source.close();
        match flushed {
            Ok(packets) => {
                self.packets_written += packets;
                self.state = JobState::Completed;
                log::info!(
                    "Exported {} frames to {}",
                    self.frames_encoded,
                    self.request.target_path.display(),
                );
                ProgressEvent::new(STATUS_COMPLETED, 100.0)
            }
            Err(error) => {
                session.sink.close();
                self.fail(&error)
            }
        }
    }

    fn fail(&mut self, error: &ReclipError) -> ProgressEvent {
        log::warn!("Export to {} failed: {error}", self.request.target_path.display());
        self.state = JobState::Failed;
        ProgressEvent::new(format!("{STATUS_CONVERTING} failed: {error}"), 0.0)
    }

    /// Release any open session and enter a terminal state.
    fn abort(&mut self, state: JobState) {
        if let Stage::Encode(mut session) = std::mem::replace(&mut self.stage, Stage::Done) {
            session.release();
        }
        if !self.state.is_terminal() {
            self.state = state;
        }
    }
}

impl Iterator for ExportPipeline {
    type Item = ProgressEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event()
    }
}

impl Drop for ExportPipeline {
    fn drop(&mut self) {
        if matches!(self.stage, Stage::Encode(_)) {
            self.abort(JobState::Cancelled);
        }
    }
}
