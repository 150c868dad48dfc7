//! Per-frame transforms applied between decode and encode.
//!
//! The export pipeline hands every frame to a [`FrameTransform`] together with
//! the source it came from, so a transform can read source properties (frame
//! size, timestamps) when, for example, undistorting with camera intrinsics.
//! Any `FnMut(&dyn FrameSource, &Frame) -> RgbImage` closure is a transform.
//!
//! # Example
//!
//! ```
//! use reclip::{Frame, FrameSource, FrameTransform};
//! use image::{RgbImage, imageops};
//!
//! let mut flip = |_source: &dyn FrameSource, frame: &Frame| -> RgbImage {
//!     imageops::flip_vertical(&frame.image)
//! };
//! # fn assert_transform(_: &mut impl FrameTransform) {}
//! # assert_transform(&mut flip);
//! ```

use image::RgbImage;

use crate::error::ReclipError;
use crate::source::{Frame, FrameSource};

/// Produces the image to encode for one decoded frame.
///
/// Transforms run on the export's worker thread, hence the [`Send`] bound.
pub trait FrameTransform: Send {
    /// Transform `frame`, decoded from `source`, into the output image.
    ///
    /// # Errors
    ///
    /// Returning an error fails the export; the pipeline releases its
    /// resources and reports the message in its terminal event.
    fn apply(&mut self, source: &dyn FrameSource, frame: &Frame) -> Result<RgbImage, ReclipError>;
}

impl<F> FrameTransform for F
where
    F: FnMut(&dyn FrameSource, &Frame) -> RgbImage + Send,
{
    fn apply(&mut self, source: &dyn FrameSource, frame: &Frame) -> Result<RgbImage, ReclipError> {
        Ok(self(source, frame))
    }
}

/// Passes frames through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl FrameTransform for IdentityTransform {
    fn apply(&mut self, _source: &dyn FrameSource, frame: &Frame) -> Result<RgbImage, ReclipError> {
        Ok(frame.image.clone())
    }
}
