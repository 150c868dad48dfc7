//! Encode-side output of an export.
//!
//! [`FrameSink`] accepts transformed frames with explicit presentation
//! timestamps and muxes whatever packets the encoder hands back.
//! [`ClipEncoder`] implements it with FFmpeg: one video stream in a
//! container inferred from the output extension, timed in the export's
//! fixed encode time base.

use std::path::{Path, PathBuf};

use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::codec::threading::{Config as ThreadingConfig, Type as ThreadingType};
use ffmpeg_next::encoder::video::Encoder as VideoEncoder;
use ffmpeg_next::format::{Flags as FormatFlags, Pixel, context::Output};
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use ffmpeg_next::error::EAGAIN;
use ffmpeg_next::{Error as FfmpegError, Packet, Rational};
use image::RgbImage;
use image::imageops::{self, FilterType};

use crate::configuration::ExportOptions;
use crate::error::ReclipError;

/// Destination for encoded frames.
///
/// Packets may lag frames because of encoder buffering, so `write_frame`
/// can return zero packets for a while and [`finish`](FrameSink::finish)
/// drains the rest.
pub trait FrameSink {
    /// Encode `image` at presentation timestamp `pts` (in encode time base
    /// ticks) and mux any packets that became ready. Returns how many packets
    /// were written.
    fn write_frame(&mut self, image: &RgbImage, pts: i64) -> Result<usize, ReclipError>;

    /// Flush the encoder, mux the remaining packets and close the container.
    /// Returns how many packets the flush wrote.
    fn finish(&mut self) -> Result<usize, ReclipError>;

    /// Close the container without draining the encoder. Idempotent.
    fn close(&mut self);
}

/// FFmpeg encoder and muxer for one output file.
pub struct ClipEncoder {
    path: PathBuf,
    state: Option<EncodeState>,
    width: u32,
    height: u32,
    time_base: Rational,
}

struct EncodeState {
    output: Output,
    encoder: VideoEncoder,
    scaler: ScalingContext,
    stream_index: usize,
    stream_time_base: Rational,
    source_frame: VideoFrame,
    encoded_frame: VideoFrame,
}

impl ClipEncoder {
    /// Create the output file at `path` and write its header.
    ///
    /// The encoder is configured for `width`×`height` YUV420P input at the
    /// time base, bit rate, tolerance and thread count in `options`.
    ///
    /// # Errors
    ///
    /// - [`ReclipError::EncodeError`] if the container, codec or stream
    ///   cannot be set up.
    pub fn create<P: AsRef<Path>>(
        path: P,
        width: u32,
        height: u32,
        options: &ExportOptions,
    ) -> Result<Self, ReclipError> {
        let path = path.as_ref().to_path_buf();
        let time_base = options.time_base();
        log::info!(
            "Creating {} ({}x{}, codec={:?}, bit_rate={}, threads={})",
            path.display(),
            width,
            height,
            options.codec(),
            options.bit_rate(),
            options.thread_count(),
        );

        ffmpeg_next::init()?;

        let mut output = ffmpeg_next::format::output(&path)
            .map_err(|e| ReclipError::EncodeError(format!("cannot open output: {e}")))?;

        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let codec_id = options.codec().to_codec_id();
        let codec = ffmpeg_next::encoder::find(codec_id).ok_or_else(|| {
            ReclipError::EncodeError(format!("codec {codec_id:?} not available"))
        })?;

        let mut stream = output
            .add_stream(codec)
            .map_err(|e| ReclipError::EncodeError(format!("cannot add stream: {e}")))?;
        let stream_index = stream.index();
        stream.set_time_base(time_base);

        let mut encoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.encoder().video())
            .map_err(|e| ReclipError::EncodeError(format!("cannot create video encoder: {e}")))?;

        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(time_base);
        encoder.set_bit_rate(options.bit_rate());
        encoder.set_tolerance(options.bit_rate_tolerance().min(i32::MAX as usize));
        let mut threading = ThreadingConfig::count(options.thread_count().min(i32::MAX as usize));
        threading.kind = ThreadingType::Frame;
        encoder.set_threading(threading);

        if needs_global_header {
            unsafe {
                (*encoder.as_mut_ptr()).flags |= ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let encoder = encoder
            .open_as(codec)
            .map_err(|e| ReclipError::EncodeError(format!("cannot open encoder: {e}")))?;

        stream.set_parameters(&encoder);

        output
            .write_header()
            .map_err(|e| ReclipError::EncodeError(format!("cannot write header: {e}")))?;

        // The muxer may pick its own stream time base while writing the header.
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .unwrap_or(time_base);

        let scaler = ScalingContext::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|e| ReclipError::EncodeError(format!("cannot create scaler: {e}")))?;

        Ok(Self {
            path,
            state: Some(EncodeState {
                output,
                encoder,
                scaler,
                stream_index,
                stream_time_base,
                source_frame: VideoFrame::new(Pixel::RGB24, width, height),
                encoded_frame: VideoFrame::empty(),
            }),
            width,
            height,
            time_base,
        })
    }

    /// Path of the output file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn state_mut(&mut self) -> Result<&mut EncodeState, ReclipError> {
        self.state
            .as_mut()
            .ok_or_else(|| ReclipError::EncodeError("output already closed".to_string()))
    }
}

impl EncodeState {
    fn write_ready_packets(&mut self, time_base: Rational) -> Result<usize, ReclipError> {
        let mut written = 0;
        let mut packet = Packet::empty();
        loop {
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => {}
                Err(FfmpegError::Other { errno: EAGAIN }) | Err(FfmpegError::Eof) => break,
                Err(e) => {
                    return Err(ReclipError::EncodeError(format!("receive_packet failed: {e}")));
                }
            }
            packet.set_stream(self.stream_index);
            packet.rescale_ts(time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|e| ReclipError::EncodeError(format!("write packet failed: {e}")))?;
            written += 1;
        }
        Ok(written)
    }
}

impl FrameSink for ClipEncoder {
    fn write_frame(&mut self, image: &RgbImage, pts: i64) -> Result<usize, ReclipError> {
        let (width, height, time_base) = (self.width, self.height, self.time_base);

        let resized;
        let image = if image.width() != width || image.height() != height {
            resized = imageops::resize(image, width, height, FilterType::Lanczos3);
            &resized
        } else {
            image
        };

        let state = self.state_mut()?;

        // Reusable RGB24 frame; copy row by row to respect the frame stride.
        let stride = state.source_frame.stride(0);
        let row_length = (width as usize) * 3;
        let pixels = image.as_raw();
        let data = state.source_frame.data_mut(0);
        for row in 0..height as usize {
            let source_start = row * row_length;
            let destination_start = row * stride;
            data[destination_start..destination_start + row_length]
                .copy_from_slice(&pixels[source_start..source_start + row_length]);
        }

        state
            .scaler
            .run(&state.source_frame, &mut state.encoded_frame)
            .map_err(|e| ReclipError::EncodeError(format!("scaling failed: {e}")))?;
        state.encoded_frame.set_pts(Some(pts));

        state
            .encoder
            .send_frame(&state.encoded_frame)
            .map_err(|e| ReclipError::EncodeError(format!("send_frame failed: {e}")))?;

        state.write_ready_packets(time_base)
    }

    fn finish(&mut self) -> Result<usize, ReclipError> {
        let time_base = self.time_base;
        let mut state = self
            .state
            .take()
            .ok_or_else(|| ReclipError::EncodeError("output already closed".to_string()))?;

        state
            .encoder
            .send_eof()
            .map_err(|e| ReclipError::EncodeError(format!("send_eof failed: {e}")))?;
        let flushed = state.write_ready_packets(time_base)?;

        state
            .output
            .write_trailer()
            .map_err(|e| ReclipError::EncodeError(format!("cannot write trailer: {e}")))?;

        log::info!("Finished {} ({flushed} packets flushed)", self.path.display());
        Ok(flushed)
    }

    fn close(&mut self) {
        if let Some(mut state) = self.state.take() {
            if let Err(error) = state.output.write_trailer() {
                log::warn!("{}: cannot write trailer: {error}", self.path.display());
            }
            log::debug!("Closed output: {}", self.path.display());
        }
    }
}

impl Drop for ClipEncoder {
    fn drop(&mut self) {
        self.close();
    }
}
