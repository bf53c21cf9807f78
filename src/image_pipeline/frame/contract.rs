//! Contract between a file draft and the producers of its frames.

use crate::image_pipeline::frame::slot::FrameBytes;
use crate::image_pipeline::frame::types::{FrameFailure, FrameGeometry};

/// One tile of one pyramid level whose bytes are produced asynchronously.
///
/// Byte and photometric accessors are only meaningful once [`Frame::is_done`]
/// is true or [`Frame::wait`] returned `Ok`.
pub trait Frame: Send {
    fn geometry(&self) -> &FrameGeometry;

    fn frame_width(&self) -> u32 {
        self.geometry().width
    }

    fn frame_height(&self) -> u32 {
        self.geometry().height
    }

    fn is_done(&self) -> bool;

    /// Blocks until production finished, returning the producer's failure if any.
    fn wait(&self) -> Result<(), FrameFailure>;

    /// Encoded tile bytes, raw samples or one compressed image.
    fn data(&self) -> FrameBytes<'_>;

    fn data_len(&self) -> usize;

    fn photometric_interpretation(&self) -> String;

    /// Releases the encoded bytes once they have been consumed.
    fn clear_buffer(&self);
}
