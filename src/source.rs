//! Decode-side access to a source video.
//!
//! [`FrameSource`] is the contract the export pipeline drives: seek to a
//! frame index, pull frames one at a time until end of stream, and report
//! where the decode cursor is. [`FileSource`] implements it on top of FFmpeg.
//!
//! A source owns exactly one decode context. It is not shared and not
//! reentrant; calls are strictly sequential.

use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational, Rescale,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    rescale,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::error::ReclipError;

/// A decoded source frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position of the frame in the source timestamp sequence.
    pub index: usize,
    /// Source timestamp of the frame, in seconds.
    pub timestamp: f64,
    /// Decoded pixels.
    pub image: RgbImage,
}

/// Sequential, seekable access to the frames of one source video.
pub trait FrameSource {
    /// Frame dimensions as `(width, height)`.
    fn frame_size(&self) -> (u32, u32);

    /// Per-frame timestamps of the source in seconds, in display order.
    fn timestamps(&self) -> &[f64];

    /// Reposition the decode cursor so the next frame returned has `index`.
    ///
    /// Seeking at or past the end is allowed; the next call to
    /// [`next_frame`](FrameSource::next_frame) then reports end of stream.
    fn seek_to_index(&mut self, index: usize) -> Result<(), ReclipError>;

    /// Decode the next frame, or `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, ReclipError>;

    /// Index of the next frame the source will return.
    fn current_index(&self) -> usize;

    /// Release the decode context. Further calls report end of stream.
    fn close(&mut self);
}

/// Open decode state. Dropped as a unit by [`FileSource::close`].
struct DecodeContext {
    input: Input,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    stream_index: usize,
    time_base: Rational,
    decoded: VideoFrame,
    converted: VideoFrame,
    eof_sent: bool,
}

/// An FFmpeg-backed [`FrameSource`] reading a video file.
///
/// Opening scans every packet of the video stream once to build the frame
/// index: packet PTS values sorted into display order. Frame `i` is the frame
/// whose PTS is the `i`-th entry. Unless the caller supplies its own sequence
/// via [`with_timestamps`](FileSource::with_timestamps), the source timestamps
/// are those PTS values converted to seconds.
pub struct FileSource {
    path: PathBuf,
    context: Option<DecodeContext>,
    pts_index: Vec<i64>,
    timestamps: Vec<f64>,
    width: u32,
    height: u32,
    current_index: usize,
    /// Frames decoded below this index are discarded after a seek.
    skip_until: usize,
}

impl FileSource {
    /// Open `path` for decoding.
    ///
    /// # Errors
    ///
    /// - [`ReclipError::SourceOpen`] if FFmpeg cannot open the file.
    /// - [`ReclipError::NoVideoStream`] if the file has no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReclipError> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening source video: {}", path.display());

        ffmpeg_next::init().map_err(|error| ReclipError::SourceOpen {
            path: path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let pts_index = scan_presentation_timestamps(&path)?;
        let context = open_decode_context(&path)?;

        let (width, height) = (context.decoder.width(), context.decoder.height());
        let time_base = context.time_base;
        let timestamps = pts_index
            .iter()
            .map(|&pts| pts_to_seconds(pts, time_base))
            .collect();

        log::info!(
            "Opened {} ({}x{}, {} frames)",
            path.display(),
            width,
            height,
            pts_index.len(),
        );

        Ok(Self {
            path,
            context: Some(context),
            pts_index,
            timestamps,
            width,
            height,
            current_index: 0,
            skip_until: 0,
        })
    }

    /// Replace the derived timestamps with a caller-supplied sequence.
    ///
    /// Useful when the recording stores frame timestamps on its own clock.
    /// Frames past the end of the supplied sequence are treated as end of
    /// stream.
    #[must_use]
    pub fn with_timestamps(mut self, timestamps: Vec<f64>) -> Self {
        if timestamps.len() != self.pts_index.len() {
            log::warn!(
                "{}: {} supplied timestamps for {} decoded frames",
                self.path.display(),
                timestamps.len(),
                self.pts_index.len(),
            );
        }
        self.timestamps = timestamps;
        self
    }

    /// Path of the opened file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of frames in the source.
    pub fn frame_count(&self) -> usize {
        self.timestamps.len().min(self.pts_index.len())
    }

    /// Whether the decode context is still open.
    pub fn is_open(&self) -> bool {
        self.context.is_some()
    }

    fn frame_index_for_pts(&self, pts: i64) -> usize {
        match self.pts_index.binary_search(&pts) {
            Ok(index) => index,
            Err(insertion) => insertion.min(self.pts_index.len().saturating_sub(1)),
        }
    }

    fn convert_current_frame(&mut self) -> Result<RgbImage, ReclipError> {
        let (width, height) = (self.width, self.height);
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| ReclipError::DecodeError("decode context closed".to_string()))?;
        context.scaler.run(&context.decoded, &mut context.converted)?;

        let buffer = frame_to_rgb_buffer(&context.converted, width, height);
        RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            ReclipError::DecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })
    }
}

impl FrameSource for FileSource {
    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    fn seek_to_index(&mut self, index: usize) -> Result<(), ReclipError> {
        log::debug!("Seeking {} to frame {index}", self.path.display());
        self.current_index = index;
        self.skip_until = index;

        let Some(&target_pts) = self.pts_index.get(index) else {
            return Ok(());
        };
        let Some(context) = self.context.as_mut() else {
            return Ok(());
        };

        // Container seeks are expressed in AV_TIME_BASE and land on the
        // preceding keyframe; frames before `index` are decoded and dropped.
        let target = target_pts.rescale(context.time_base, rescale::TIME_BASE);
        context.input.seek(target, ..target)?;
        context.decoder.flush();
        context.eof_sent = false;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, ReclipError> {
        let limit = self.frame_count();
        if self.current_index >= limit {
            return Ok(None);
        }

        loop {
            let Some(context) = self.context.as_mut() else {
                return Ok(None);
            };

            if context.decoder.receive_frame(&mut context.decoded).is_ok() {
                let Some(pts) = context.decoded.timestamp().or(context.decoded.pts()) else {
                    continue;
                };
                let index = self.frame_index_for_pts(pts);
                if index < self.skip_until {
                    continue;
                }
                if index >= limit {
                    self.current_index = limit;
                    return Ok(None);
                }

                let image = self.convert_current_frame()?;
                self.current_index = index + 1;
                return Ok(Some(Frame {
                    index,
                    timestamp: self.timestamps[index],
                    image,
                }));
            }

            if context.eof_sent {
                self.current_index = limit;
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut context.input) {
                Ok(()) => {
                    if packet.stream() == context.stream_index {
                        context.decoder.send_packet(&packet).map_err(|error| {
                            ReclipError::DecodeError(format!("send_packet failed: {error}"))
                        })?;
                    }
                }
                Err(FfmpegError::Eof) => {
                    context.decoder.send_eof()?;
                    context.eof_sent = true;
                }
                Err(error) => {
                    log::warn!("{}: skipping unreadable packet: {error}", self.path.display());
                }
            }
        }
    }

    fn current_index(&self) -> usize {
        self.current_index
    }

    fn close(&mut self) {
        if self.context.take().is_some() {
            log::debug!("Closed source video: {}", self.path.display());
        }
    }
}

/// Collect the PTS of every video packet, sorted into display order.
fn scan_presentation_timestamps(path: &Path) -> Result<Vec<i64>, ReclipError> {
    let mut input = open_input(path)?;
    let stream_index = input
        .streams()
        .best(Type::Video)
        .map(|stream| stream.index())
        .ok_or_else(|| ReclipError::NoVideoStream(path.to_path_buf()))?;

    let mut pts_values = Vec::new();
    let mut packet = Packet::empty();
    loop {
        match packet.read(&mut input) {
            Ok(()) => {
                if packet.stream() != stream_index {
                    continue;
                }
                if let Some(pts) = packet.pts().or(packet.dts()) {
                    pts_values.push(pts);
                }
            }
            Err(FfmpegError::Eof) => break,
            Err(error) => return Err(ReclipError::from(error)),
        }
    }

    pts_values.sort_unstable();
    pts_values.dedup();
    Ok(pts_values)
}

fn open_input(path: &Path) -> Result<Input, ReclipError> {
    ffmpeg_next::format::input(&path).map_err(|error| ReclipError::SourceOpen {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })
}

fn open_decode_context(path: &Path) -> Result<DecodeContext, ReclipError> {
    let input = open_input(path)?;
    let stream = input
        .streams()
        .best(Type::Video)
        .ok_or_else(|| ReclipError::NoVideoStream(path.to_path_buf()))?;
    let stream_index = stream.index();
    let time_base = stream.time_base();

    let decoder = CodecContext::from_parameters(stream.parameters())
        .and_then(|context| context.decoder().video())
        .map_err(|error| ReclipError::SourceOpen {
            path: path.to_path_buf(),
            reason: format!("Failed to create video decoder: {error}"),
        })?;

    let scaler = ScalingContext::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        ScalingFlags::BILINEAR,
    )?;

    Ok(DecodeContext {
        input,
        decoder,
        scaler,
        stream_index,
        time_base,
        decoded: VideoFrame::empty(),
        converted: VideoFrame::empty(),
        eof_sent: false,
    })
}

fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator().max(1) as f64
}

/// Copy an RGB24 frame into a tightly packed buffer, dropping row padding.
fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_length = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == row_length {
        data[..row_length * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_length * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_length]);
        }
        buffer
    }
}
