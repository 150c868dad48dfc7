//! In-memory media backend shared by the integration tests.
//!
//! `SyntheticBackend` serves frames filled with a colour derived from their
//! index and records everything the pipeline does to the output, so exports
//! can be checked without FFmpeg fixtures.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};
use reclip::{ExportOptions, Frame, FrameSink, FrameSource, MediaBackend, ProgressEvent, ReclipError};

/// What happened to the sources and sinks of a backend.
#[derive(Debug, Default, Clone)]
pub struct BackendLog {
    pub opened_sources: Vec<PathBuf>,
    pub closed_sources: usize,
    pub seeks: Vec<usize>,
    pub created_sinks: Vec<PathBuf>,
    pub sink_sizes: Vec<(u32, u32)>,
    /// Sinks still open at the moment each new sink was created.
    pub open_sinks_at_create: Vec<usize>,
    pub closed_sinks: usize,
    pub finished_sinks: usize,
    pub pts: Vec<i64>,
    pub frame_sizes: Vec<(u32, u32)>,
    pub first_pixels: Vec<u8>,
}

impl BackendLog {
    /// Every source and sink that was opened has been released.
    pub fn all_released(&self) -> bool {
        self.opened_sources.len() == self.closed_sources
            && self.created_sinks.len() == self.closed_sinks
    }
}

#[derive(Clone)]
pub struct SyntheticBackend {
    pub timestamps: Vec<f64>,
    pub width: u32,
    pub height: u32,
    /// Report end of stream once this many frames exist.
    pub truncate_at: Option<usize>,
    pub fail_source: bool,
    pub fail_sink: bool,
    /// Fail `write_frame` for the n-th written frame (zero based).
    pub fail_write_at: Option<usize>,
    pub fail_finish: bool,
    pub frame_delay: Option<Duration>,
    pub log: Arc<Mutex<BackendLog>>,
}

impl SyntheticBackend {
    pub fn new(timestamps: Vec<f64>) -> Self {
        Self {
            timestamps,
            width: 8,
            height: 6,
            truncate_at: None,
            fail_source: false,
            fail_sink: false,
            fail_write_at: None,
            fail_finish: false,
            frame_delay: None,
            log: Arc::new(Mutex::new(BackendLog::default())),
        }
    }

    /// Evenly spaced timestamps, `count` frames at `fps`.
    pub fn constant_rate(count: usize, fps: f64) -> Self {
        Self::new((0..count).map(|i| i as f64 / fps).collect())
    }

    pub fn log(&self) -> BackendLog {
        self.log.lock().unwrap().clone()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl MediaBackend for SyntheticBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>, ReclipError> {
        if self.fail_source {
            return Err(ReclipError::SourceOpen {
                path: path.to_path_buf(),
                reason: "synthetic failure".to_string(),
            });
        }
        self.log.lock().unwrap().opened_sources.push(path.to_path_buf());
        Ok(Box::new(SyntheticSource {
            timestamps: self.timestamps.clone(),
            width: self.width,
            height: self.height,
            available: self.truncate_at.unwrap_or(self.timestamps.len()),
            cursor: 0,
            closed: false,
            delay: self.frame_delay,
            log: Arc::clone(&self.log),
        }))
    }

    fn open_sink(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        _options: &ExportOptions,
    ) -> Result<Box<dyn FrameSink>, ReclipError> {
        if self.fail_sink {
            return Err(ReclipError::EncodeError("synthetic sink failure".to_string()));
        }
        let mut log = self.log.lock().unwrap();
        let still_open = log.created_sinks.len() - log.closed_sinks;
        log.open_sinks_at_create.push(still_open);
        log.created_sinks.push(path.to_path_buf());
        log.sink_sizes.push((width, height));
        drop(log);
        Ok(Box::new(RecordingSink {
            written: 0,
            fail_write_at: self.fail_write_at,
            fail_finish: self.fail_finish,
            closed: false,
            log: Arc::clone(&self.log),
        }))
    }
}

pub struct SyntheticSource {
    timestamps: Vec<f64>,
    width: u32,
    height: u32,
    available: usize,
    cursor: usize,
    closed: bool,
    delay: Option<Duration>,
    log: Arc<Mutex<BackendLog>>,
}

impl FrameSource for SyntheticSource {
    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    fn seek_to_index(&mut self, index: usize) -> Result<(), ReclipError> {
        self.log.lock().unwrap().seeks.push(index);
        self.cursor = index;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, ReclipError> {
        if self.closed || self.cursor >= self.available.min(self.timestamps.len()) {
            return Ok(None);
        }
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let index = self.cursor;
        self.cursor += 1;
        Ok(Some(Frame {
            index,
            timestamp: self.timestamps[index],
            image: RgbImage::from_pixel(self.width, self.height, Rgb([index as u8, 0, 0])),
        }))
    }

    fn current_index(&self) -> usize {
        self.cursor
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.log.lock().unwrap().closed_sources += 1;
        }
    }
}

pub struct RecordingSink {
    written: usize,
    fail_write_at: Option<usize>,
    fail_finish: bool,
    closed: bool,
    log: Arc<Mutex<BackendLog>>,
}

impl FrameSink for RecordingSink {
    fn write_frame(&mut self, image: &RgbImage, pts: i64) -> Result<usize, ReclipError> {
        if self.closed {
            return Err(ReclipError::EncodeError("output already closed".to_string()));
        }
        if self.fail_write_at == Some(self.written) {
            return Err(ReclipError::EncodeError("synthetic write failure".to_string()));
        }
        self.written += 1;
        let mut log = self.log.lock().unwrap();
        log.pts.push(pts);
        log.frame_sizes.push(image.dimensions());
        log.first_pixels.push(image.get_pixel(0, 0)[0]);
        Ok(1)
    }

    fn finish(&mut self) -> Result<usize, ReclipError> {
        if self.closed {
            return Err(ReclipError::EncodeError("output already closed".to_string()));
        }
        if self.fail_finish {
            return Err(ReclipError::EncodeError("synthetic flush failure".to_string()));
        }
        self.closed = true;
        let mut log = self.log.lock().unwrap();
        log.finished_sinks += 1;
        log.closed_sinks += 1;
        Ok(0)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.log.lock().unwrap().closed_sinks += 1;
        }
    }
}

/// Assert that percents never decrease.
pub fn assert_non_decreasing(events: &[ProgressEvent]) {
    for pair in events.windows(2) {
        assert!(
            pair[1].percent >= pair[0].percent,
            "percent went from {} to {} ({:?})",
            pair[0].percent,
            pair[1].percent,
            events
        );
    }
}

/// Poll `condition` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
