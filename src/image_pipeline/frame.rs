//! Frame production module
//!
//! This module defines the per-tile unit of work, its completion handoff and
//! the TIFF backed pyramid source frames are produced from.

mod contract;
mod encoder;
mod source;
mod tiff_frame;
mod tiff_source;
pub mod slot;
pub mod types;

pub use contract::Frame;
pub use encoder::{encode_tile, resize_rgb};
pub use source::{LevelInfo, PyramidSource};
pub use tiff_frame::{TiffFrame, source_level_for};
pub use tiff_source::TiffPyramidSource;
pub use slot::{FrameBytes, FrameSlot};
pub use types::{FrameFailure, FrameGeometry, FrameOutput};
