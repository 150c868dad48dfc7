//! Background execution of an export.
//!
//! [`ExportTask`] runs an [`ExportPipeline`] on a dedicated worker thread and
//! hands its events back through an unbounded channel. The owning thread
//! never blocks: [`fetch`](ExportTask::fetch) drains whatever has arrived
//! since the last call and returns immediately.
//!
//! The decoder and encoder are created on the worker thread, so they never
//! cross threads. Cancellation is cooperative; the worker notices it at the
//! next frame boundary, releases both ends of the export and exits.
//! [`cancel`](ExportTask::cancel) waits for that exit, so the output file is
//! closed by the time the task reports [`JobState::Cancelled`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use reclip::{ExportRequest, ExportTask, TimeWindow};
//!
//! let timestamps: Vec<f64> = (0..300).map(|i| i as f64 / 30.0).collect();
//! let request = ExportRequest::new(
//!     timestamps,
//!     "recording/world.mp4",
//!     "export/scene.mp4",
//!     TimeWindow::new(2.0, 4.0)?,
//! );
//!
//! let mut task = ExportTask::start("scene", request)?;
//! while !task.state().is_terminal() {
//!     for event in task.fetch() {
//!         println!("{event}");
//!     }
//!     std::thread::sleep(Duration::from_millis(50));
//! }
//! # Ok::<(), reclip::ReclipError>(())
//! ```

use std::thread::{self, JoinHandle};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, error::TryRecvError};

use crate::error::ReclipError;
use crate::pipeline::{ExportPipeline, ExportRequest};
use crate::progress::{CancellationToken, JobState, ProgressEvent};

/// Message sent from the worker thread to the task handle.
#[derive(Debug)]
pub(crate) enum TaskMessage {
    Progress(ProgressEvent),
    Finished(JobState),
}

/// Handle to an export running on a background thread.
///
/// Dropping the handle cancels the export and waits for the worker to exit.
pub struct ExportTask {
    name: String,
    pub(crate) receiver: UnboundedReceiver<TaskMessage>,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
    pub(crate) state: JobState,
}

impl ExportTask {
    /// Start running `request` on a new worker thread named after `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ReclipError::IoError`] if the thread cannot be spawned.
    pub fn start(name: impl Into<String>, request: ExportRequest) -> Result<Self, ReclipError> {
        let name = name.into();
        let token = CancellationToken::new();
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();

        let worker_token = token.clone();
        let handle = thread::Builder::new()
            .name(format!("reclip-{name}"))
            .spawn(move || run_export(request, worker_token, sender))?;

        log::debug!("Started export task {name:?}");
        Ok(Self {
            name,
            receiver,
            token,
            handle: Some(handle),
            state: JobState::Pending,
        })
    }

    /// Name given at start.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latest known job state.
    ///
    /// Updated by [`fetch`](ExportTask::fetch) and [`cancel`](ExportTask::cancel).
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Return every event produced since the last call, in emission order.
    ///
    /// Never blocks. Returns nothing once the task has been cancelled.
    pub fn fetch(&mut self) -> Vec<ProgressEvent> {
        if self.token.is_cancelled() {
            return Vec::new();
        }

        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(TaskMessage::Progress(event)) => {
                    if self.state == JobState::Pending {
                        self.state = JobState::Running;
                    }
                    events.push(event);
                }
                Ok(TaskMessage::Finished(state)) => self.state = state,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.state.is_terminal() {
                        log::warn!("Export task {:?} ended without reporting", self.name);
                        self.state = JobState::Failed;
                    }
                    break;
                }
            }
        }
        events
    }

    /// Cancel the export and wait for the worker to exit.
    ///
    /// The worker stops at its next frame boundary and releases the decoder
    /// and output file before exiting, so this blocks for at most one frame.
    /// A task that already finished keeps its terminal state.
    pub fn cancel(&mut self) {
        self.token.cancel();
        if !self.state.is_terminal() {
            log::info!("Cancelling export task {:?}", self.name);
        }
        self.join_worker();
        if !self.state.is_terminal() {
            self.state = JobState::Cancelled;
        }
    }

    /// Whether cancellation was requested, as opposed to natural completion.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Block until the worker thread exits, then return the events not yet
    /// fetched.
    pub fn wait(&mut self) -> Vec<ProgressEvent> {
        self.join_worker();
        self.fetch()
    }

    fn join_worker(&mut self) {
        let panicked = self
            .handle
            .take()
            .is_some_and(|handle| handle.join().is_err());
        if panicked {
            log::warn!("Export task {:?} panicked", self.name);
            self.state = JobState::Failed;
        }
    }
}

impl Drop for ExportTask {
    fn drop(&mut self) {
        self.token.cancel();
        self.join_worker();
    }
}

fn run_export(request: ExportRequest, token: CancellationToken, sender: UnboundedSender<TaskMessage>) {
    let mut pipeline = ExportPipeline::new(request).with_cancellation(token);
    while let Some(event) = pipeline.next_event() {
        if sender.send(TaskMessage::Progress(event)).is_err() {
            // Handle dropped; dropping the pipeline releases the session.
            return;
        }
    }
    let _ = sender.send(TaskMessage::Finished(pipeline.state()));
}
