//! Time window to frame index resolution.
//!
//! A recording keeps one global timestamp sequence (one entry per logical
//! sample) while the source video carries its own, independently spaced
//! per-frame timestamps. Exporting a [`TimeWindow`] first narrows the global
//! sequence down to the samples inside the window ([`exact_window`]) and then
//! snaps the boundaries of that slice onto the nearest source frames
//! ([`closest_index`]), yielding an inclusive [`ExportRange`].
//!
//! # Example
//!
//! ```
//! use reclip::{TimeWindow, resolve_export_range};
//!
//! let global = [0.9, 1.0, 1.25, 1.5, 1.75, 2.0, 2.1];
//! let source = [0.95, 1.00, 1.50, 2.00, 2.05];
//! let window = TimeWindow::new(1.0, 2.0)?;
//!
//! let range = resolve_export_range(&global, &source, window).unwrap();
//! assert_eq!((range.start, range.end), (1, 3));
//! # Ok::<(), reclip::ReclipError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::ReclipError;

/// A recording-relative `[start, end]` interval in seconds.
///
/// Both bounds are inclusive. Construction rejects `start > end` and
/// non-finite bounds, so a window is always well-formed once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    start: f64,
    end: f64,
}

impl TimeWindow {
    /// Create a window from two timestamps in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ReclipError::InvalidWindow`] if either bound is not finite
    /// or `start > end`.
    pub fn new(start: f64, end: f64) -> Result<Self, ReclipError> {
        if !start.is_finite() || !end.is_finite() || start > end {
            return Err(ReclipError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window start, in seconds.
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Window end, in seconds.
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Length of the window in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether `timestamp` lies inside the window (inclusive on both ends).
    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

impl Display for TimeWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[{:.3}s, {:.3}s]", self.start, self.end)
    }
}

/// Inclusive range of source frame indices selected for export.
///
/// `start <= end` always holds and `end` is a valid index into the source
/// timestamp sequence the range was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExportRange {
    /// Index of the first frame to encode.
    pub start: usize,
    /// Index of the last frame to encode.
    pub end: usize,
}

impl ExportRange {
    /// Number of frames in the range.
    pub fn frame_count(&self) -> usize {
        self.end - self.start + 1
    }

    /// Whether `index` falls inside the range.
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index <= self.end
    }
}

impl Display for ExportRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Which neighbour wins when a target is equidistant from two candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    /// Prefer the smaller index. Used for the start of a range.
    Earlier,
    /// Prefer the larger index. Used for the end of a range.
    Later,
}

/// Return the slice of `timestamps` that lies inside `window`.
///
/// `timestamps` must be sorted in non-decreasing order. The result may be
/// empty when no sample falls inside the window.
pub fn exact_window(timestamps: &[f64], window: TimeWindow) -> &[f64] {
    let lower = timestamps.partition_point(|&t| t < window.start);
    let upper = timestamps.partition_point(|&t| t <= window.end);
    &timestamps[lower..upper.max(lower)]
}

/// Find the index of the timestamp closest to `target`.
///
/// Equidistant candidates, including runs of identical timestamps, are
/// resolved by `tie`. Returns `None` only when `timestamps` is empty.
pub fn closest_index(timestamps: &[f64], target: f64, tie: TieBreak) -> Option<usize> {
    if timestamps.is_empty() {
        return None;
    }
    let last = timestamps.len() - 1;

    match tie {
        TieBreak::Earlier => {
            // left: last value < target, right: first value >= target
            let right = timestamps.partition_point(|&t| t < target);
            if right == 0 {
                return Some(0);
            }
            let left = right - 1;
            if right > last || target - timestamps[left] <= timestamps[right] - target {
                let value = timestamps[left];
                Some(timestamps.partition_point(|&t| t < value))
            } else {
                Some(right)
            }
        }
        TieBreak::Later => {
            // left: last value <= target, right: first value > target
            let right = timestamps.partition_point(|&t| t <= target);
            if right > last {
                return Some(last);
            }
            if right == 0 || timestamps[right] - target <= target - timestamps[right - 1] {
                let value = timestamps[right];
                Some(timestamps.partition_point(|&t| t <= value) - 1)
            } else {
                Some(right - 1)
            }
        }
    }
}

/// Map every target onto its closest index in `timestamps`.
///
/// Returns an empty vector when `timestamps` is empty.
pub fn find_closest(timestamps: &[f64], targets: &[f64], tie: TieBreak) -> Vec<usize> {
    targets
        .iter()
        .filter_map(|&target| closest_index(timestamps, target, tie))
        .collect()
}

/// Resolve a time window into the inclusive range of source frames to export.
///
/// The global samples inside `window` are located first; their first and
/// last timestamps are then mapped onto the nearest source frames, the start
/// preferring the earlier frame on a tie and the end preferring the later
/// one. Returns `None` when there is nothing to export: no global sample in
/// the window, an empty source, or a window that lies entirely outside the
/// source's timestamp span.
pub fn resolve_export_range(
    global_timestamps: &[f64],
    source_timestamps: &[f64],
    window: TimeWindow,
) -> Option<ExportRange> {
    let exact = exact_window(global_timestamps, window);
    let (&first, &last) = (exact.first()?, exact.last()?);
    let (&source_first, &source_last) = (source_timestamps.first()?, source_timestamps.last()?);

    if last < source_first || first > source_last {
        log::debug!(
            "Window {window} does not intersect source span [{source_first:.3}s, {source_last:.3}s]"
        );
        return None;
    }

    let start = closest_index(source_timestamps, first, TieBreak::Earlier)?;
    let end = closest_index(source_timestamps, last, TieBreak::Later)?;
    let range = ExportRange {
        start: start.min(end),
        end,
    };
    log::debug!("Resolved window {window} to source frames {range}");
    Some(range)
}
