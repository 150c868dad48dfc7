//! Export job orchestration.
//!
//! An [`Exporter`] belongs to one recording. It turns export requests into
//! [`ExportTask`]s, keeps track of the ones in flight and folds their events
//! into a single observable status line and percent, meant to be refreshed by
//! calling [`poll`](Exporter::poll) on every host tick. Only cancellation
//! blocks, until the cancelled workers have closed their output files.
//!
//! # Example
//!
//! ```no_run
//! use reclip::{Exporter, ExporterOptions, Recording, TimeWindow};
//!
//! let timestamps: Vec<f64> = (0..300).map(|i| i as f64 / 30.0).collect();
//! let recording = Recording::new("recording", timestamps);
//! let mut exporter = Exporter::new(recording, ExporterOptions::new("Scene_Export"));
//!
//! let folder = exporter.start_export(
//!     TimeWindow::new(2.0, 4.0)?,
//!     "exports",
//!     |_: &dyn reclip::FrameSource, frame: &reclip::Frame| frame.image.clone(),
//! )?;
//! println!("exporting to {}", folder.display());
//!
//! while exporter.has_running_tasks() {
//!     exporter.poll();
//!     println!("{} ({:.0}%)", exporter.status(), exporter.progress());
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//! # Ok::<(), reclip::ReclipError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::configuration::ExportOptions;
use crate::error::ReclipError;
use crate::pipeline::{ExportRequest, FfmpegBackend, MediaBackend};
use crate::recording::{
    DEFAULT_VIDEO_EXTENSIONS, Recording, export_folder_name, find_source_video, read_start_date,
};
use crate::task::ExportTask;
use crate::timestamps::TimeWindow;
use crate::transform::{FrameTransform, IdentityTransform};

/// Status shown after the exports were cancelled.
pub const STATUS_CANCELLED: &str = "Export has been canceled";

/// Naming and lookup settings of an [`Exporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterOptions {
    plugin_name: String,
    input_name: String,
    output_name: String,
    extensions: Vec<String>,
}

impl ExporterOptions {
    /// Options for an exporter named `plugin_name`.
    ///
    /// Reads `world.*` from the recording and writes `scene.mp4`.
    pub fn new(plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            input_name: "world".to_string(),
            output_name: "scene".to_string(),
            extensions: DEFAULT_VIDEO_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }

    /// Base name of the source video inside the recording.
    #[must_use]
    pub fn with_input_name(mut self, name: impl Into<String>) -> Self {
        self.input_name = name.into();
        self
    }

    /// Base name of the exported video; the extension is always `.mp4`.
    #[must_use]
    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = name.into();
        self
    }

    /// Accepted source container extensions, without the dot.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Exporter name, used for folder and task names.
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Source video base name.
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Output video base name.
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Accepted source container extensions.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl Default for ExporterOptions {
    fn default() -> Self {
        Self::new("Video_Export")
    }
}

type TransformFactory = Box<dyn FnMut(&Recording) -> Box<dyn FrameTransform>>;

/// Customisation points used when an export is triggered by a
/// [`Notification`].
pub struct ExportHooks {
    make_transform: TransformFactory,
}

impl ExportHooks {
    /// Build each export's frame transform with `make_transform`.
    pub fn new<F>(make_transform: F) -> Self
    where
        F: FnMut(&Recording) -> Box<dyn FrameTransform> + 'static,
    {
        Self {
            make_transform: Box::new(make_transform),
        }
    }
}

impl Default for ExportHooks {
    fn default() -> Self {
        Self::new(|_| Box::new(IdentityTransform))
    }
}

/// Messages a host sends to an [`Exporter`].
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Notification {
    /// Export `window` of the recording below `export_dir`, replacing any
    /// export still running.
    ShouldExport {
        /// Recording-relative time window.
        window: TimeWindow,
        /// Directory the export folder is created in.
        export_dir: PathBuf,
    },
    /// Any other subject; ignored.
    Other(String),
}

/// Starts exports for one recording and aggregates their progress.
///
/// Dropping the exporter cancels every export it is tracking.
pub struct Exporter {
    recording: Recording,
    options: ExporterOptions,
    export_options: ExportOptions,
    backend: Arc<dyn MediaBackend>,
    hooks: ExportHooks,
    tasks: Vec<ExportTask>,
    status: String,
    progress: f64,
    output: Option<PathBuf>,
}

impl Exporter {
    /// Create an exporter for `recording` using FFmpeg and default export
    /// options.
    pub fn new(recording: Recording, options: ExporterOptions) -> Self {
        Self {
            recording,
            options,
            export_options: ExportOptions::default(),
            backend: Arc::new(FfmpegBackend),
            hooks: ExportHooks::default(),
            tasks: Vec::new(),
            status: String::new(),
            progress: 0.0,
            output: None,
        }
    }

    /// Encode with `export_options`.
    #[must_use]
    pub fn with_export_options(mut self, export_options: ExportOptions) -> Self {
        self.export_options = export_options;
        self
    }

    /// Decode and encode through `backend`.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn MediaBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Use `hooks` for notification-triggered exports.
    #[must_use]
    pub fn with_hooks(mut self, hooks: ExportHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Start exporting `window` into a folder below `export_dir`.
    ///
    /// The folder is named after the exporter and the recording start date and
    /// created if needed. Returns its path as soon as the background task is
    /// running. When the recording has no matching source video, the task
    /// still starts and reports the failure through its events.
    ///
    /// # Errors
    ///
    /// Local I/O failures: reading the recording directory or its metadata,
    /// creating the folder, or spawning the worker thread.
    pub fn start_export(
        &mut self,
        window: TimeWindow,
        export_dir: impl AsRef<Path>,
        transform: impl FrameTransform + 'static,
    ) -> Result<PathBuf, ReclipError> {
        self.start_boxed_export(window, export_dir.as_ref(), Box::new(transform))
    }

    fn start_boxed_export(
        &mut self,
        window: TimeWindow,
        export_dir: &Path,
        transform: Box<dyn FrameTransform>,
    ) -> Result<PathBuf, ReclipError> {
        let dir = self.recording.dir();
        let start_date = read_start_date(dir)?;
        let folder = export_dir.join(export_folder_name(
            &self.options.plugin_name,
            start_date.as_deref(),
        ));
        fs::create_dir_all(&folder)?;
        log::info!("Exporting to {}", folder.display());

        let target = folder.join(format!("{}.mp4", self.options.output_name));
        let timestamps = Arc::clone(self.recording.timestamps());
        let request = match find_source_video(dir, &self.options.input_name, &self.options.extensions)? {
            Some(source) => ExportRequest::new(timestamps, source, target, window),
            None => {
                log::warn!(
                    "{}",
                    ReclipError::SourceNotFound {
                        directory: dir.to_path_buf(),
                        base_name: self.options.input_name.clone(),
                    }
                );
                ExportRequest::without_source(timestamps, target, window)
            }
        };
        let request = request
            .with_boxed_transform(transform)
            .with_options(self.export_options.clone())
            .with_backend(Arc::clone(&self.backend));

        let task = ExportTask::start(format!("{} Video Export", self.options.plugin_name), request)?;
        self.tasks.push(task);
        self.output = Some(folder.clone());
        Ok(folder)
    }

    /// Cancel every tracked export and forget about them.
    ///
    /// Returns once every cancelled worker has released its source and
    /// output, so a new export may reuse the same target file.
    pub fn cancel_all(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        for task in &mut self.tasks {
            task.cancel();
        }
        self.tasks.clear();
        self.status = STATUS_CANCELLED.to_string();
        self.progress = 0.0;
    }

    /// Fetch new events from every tracked export and update
    /// [`status`](Exporter::status) and [`progress`](Exporter::progress) from
    /// the most recent one.
    ///
    /// Exports that have finished are dropped from the registry once their
    /// terminal event has been observed.
    pub fn poll(&mut self) {
        for task in &mut self.tasks {
            if let Some(last) = task.fetch().pop() {
                self.status = last.status;
                self.progress = last.percent;
            }
            if task.is_cancelled() {
                self.status = STATUS_CANCELLED.to_string();
                self.progress = 0.0;
            }
        }
        self.tasks
            .retain(|task| !(task.state().is_terminal() && task.is_finished()));
    }

    /// Handle a host notification.
    ///
    /// [`Notification::ShouldExport`] cancels running exports and starts a
    /// new one with a transform from the [`ExportHooks`]; it returns the new
    /// export folder. Other notifications are ignored.
    pub fn on_notify(&mut self, notification: &Notification) -> Result<Option<PathBuf>, ReclipError> {
        match notification {
            Notification::ShouldExport { window, export_dir } => {
                self.cancel_all();
                let transform = (self.hooks.make_transform)(&self.recording);
                self.start_boxed_export(*window, export_dir, transform).map(Some)
            }
            Notification::Other(subject) => {
                log::debug!("Ignoring notification {subject:?}");
                Ok(None)
            }
        }
    }

    /// Latest status line.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Latest completion percentage.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Folder of the most recently started export.
    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Number of exports still tracked.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Whether any tracked export has not reached a terminal state yet.
    pub fn has_running_tasks(&self) -> bool {
        self.tasks.iter().any(|task| !task.state().is_terminal())
    }

    /// The recording being exported.
    pub fn recording(&self) -> &Recording {
        &self.recording
    }
}

impl Drop for Exporter {
    fn drop(&mut self) {
        for task in &mut self.tasks {
            task.cancel();
        }
    }
}
