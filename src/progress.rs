//! Progress events, job states and cooperative cancellation.
//!
//! An export reports what it is doing as a sequence of [`ProgressEvent`]s.
//! Percent values are non-decreasing within one job: a small liveness event
//! first, throttled updates in `[10, 100]` while frames are encoded, and a
//! terminal event at exactly 100 on completion. A failure ends the sequence
//! with a terminal event at 0.
//!
//! [`CancellationToken`] is the only signal flowing the other way, from the
//! host to the running job.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Share of the percent scale reserved for setup before the first frame.
pub(crate) const SETUP_PERCENT: f64 = 10.0;

/// A `(status, percent)` pair emitted by a running export.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Human readable status line.
    pub status: String,
    /// Completion percentage in `[0, 100]`.
    pub percent: f64,
}

impl ProgressEvent {
    /// Create an event, clamping `percent` into `[0, 100]`.
    pub fn new(status: impl Into<String>, percent: f64) -> Self {
        Self {
            status: status.into(),
            percent: percent.clamp(0.0, 100.0),
        }
    }
}

impl Display for ProgressEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} ({:.0}%)", self.status, self.percent)
    }
}

/// Lifecycle of one export job.
///
/// `Pending → Running → {Completed | Failed | Cancelled}`. Completed and
/// Failed are reached through the job's terminal [`ProgressEvent`];
/// Cancelled only through an explicit cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Created but no event produced yet.
    Pending,
    /// Producing progress events.
    Running,
    /// Finished normally; the last event was at 100%.
    Completed,
    /// Finished with an error; the last event was at 0%.
    Failed,
    /// Stopped on request before finishing.
    Cancelled,
}

impl JobState {
    /// Whether the job can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clones share state. The export loop checks the token between frames, so
/// cancellation takes effect at the next frame boundary and never mid-frame.
///
/// # Example
///
/// ```
/// use reclip::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Decides when an encoding loop should report progress.
///
/// Reports fire every `update_rate` source indices, measured against the
/// adapter's current index (the index of the next frame to decode). The
/// fraction of the range covered is mapped onto `[10, 100]`.
#[derive(Debug, Clone)]
pub(crate) struct ProgressThrottle {
    range_start: usize,
    range_end: usize,
    update_rate: usize,
    next_update_index: usize,
}

impl ProgressThrottle {
    pub(crate) fn new(range_start: usize, range_end: usize, update_rate: usize) -> Self {
        let update_rate = update_rate.max(1);
        Self {
            range_start,
            range_end,
            update_rate,
            next_update_index: range_start + update_rate,
        }
    }

    /// Observe the adapter's current index; returns a percent when a report is due.
    pub(crate) fn observe(&mut self, current_index: usize) -> Option<f64> {
        if current_index < self.next_update_index {
            return None;
        }
        while self.next_update_index <= current_index {
            self.next_update_index += self.update_rate;
        }
        Some(self.percent_at(current_index))
    }

    pub(crate) fn percent_at(&self, current_index: usize) -> f64 {
        let span = self.range_end.saturating_sub(self.range_start);
        let fraction = if span == 0 {
            1.0
        } else {
            current_index.saturating_sub(self.range_start) as f64 / span as f64
        };
        let percent = fraction * (100.0 - SETUP_PERCENT) + SETUP_PERCENT;
        percent.clamp(SETUP_PERCENT, 100.0)
    }
}
