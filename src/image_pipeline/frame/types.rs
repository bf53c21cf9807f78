//! Frame data types

use thiserror::Error;

/// Placement of one frame within its pyramid level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Left edge in level pixel space
    pub x: u64,
    /// Top edge in level pixel space
    pub y: u64,
    pub level: u32,
    pub width: u32,
    pub height: u32,
    /// Level resolution relative to the full resolution image
    pub downsample: u32,
}

/// Encoded bytes of a finished frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    /// Raw interleaved samples or one compressed image
    pub bytes: Vec<u8>,
    /// Colour model the bytes were produced in
    pub photometric: String,
}

/// Reason a frame producer gave up
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct FrameFailure(pub String);
