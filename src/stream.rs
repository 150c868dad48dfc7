//! Async observation of a running export.
//!
//! [`ProgressStream`] adapts an [`ExportTask`]'s event channel to
//! [`tokio_stream::Stream`], so an async host can `await` progress instead of
//! polling. The export itself still runs on the task's worker thread.
//!
//! # Example
//!
//! ```no_run
//! use tokio_stream::StreamExt;
//!
//! use reclip::{ExportRequest, ExportTask, ReclipError, TimeWindow};
//!
//! # async fn example() -> Result<(), ReclipError> {
//! let timestamps: Vec<f64> = (0..300).map(|i| i as f64 / 30.0).collect();
//! let request = ExportRequest::new(
//!     timestamps,
//!     "recording/world.mp4",
//!     "export/scene.mp4",
//!     TimeWindow::new(2.0, 4.0)?,
//! );
//!
//! let mut events = ExportTask::start("scene", request)?.into_stream();
//! while let Some(event) = events.next().await {
//!     println!("{event}");
//! }
//! println!("finished: {:?}", events.state());
//! # Ok(())
//! # }
//! ```

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio_stream::Stream;

use crate::progress::{JobState, ProgressEvent};
use crate::task::{ExportTask, TaskMessage};

/// A stream of the [`ProgressEvent`]s of one export.
///
/// Ends after the terminal event. Dropping the stream cancels the export and
/// blocks until the worker stops at its next frame boundary.
pub struct ProgressStream {
    task: ExportTask,
}

impl ProgressStream {
    /// Job state as last observed by the stream.
    pub fn state(&self) -> JobState {
        self.task.state
    }

    /// Cancel the export and wait for the worker to release its files. The
    /// stream then yields any events still queued and ends.
    pub fn cancel(&mut self) {
        self.task.cancel();
    }
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(self.task.receiver.poll_recv(cx)) {
                Some(TaskMessage::Progress(event)) => {
                    if self.task.state == JobState::Pending {
                        self.task.state = JobState::Running;
                    }
                    return Poll::Ready(Some(event));
                }
                Some(TaskMessage::Finished(state)) => {
                    if !self.task.state.is_terminal() {
                        self.task.state = state;
                    }
                }
                None => return Poll::Ready(None),
            }
        }
    }
}

impl ExportTask {
    /// Observe the task's events as an async stream.
    pub fn into_stream(self) -> ProgressStream {
        ProgressStream { task: self }
    }
}
