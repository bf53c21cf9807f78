//! Common utilities module
//!
//! This module contains shared utilities used across the image pipeline.

pub mod error;

pub use error::{ConversionError, Result};

/// Integer division rounding towards positive infinity.
///
/// Returns 0 when `divisor` is 0 so degenerate (empty) batches never panic.
pub fn div_ceil(value: u64, divisor: u64) -> u64 {
    if divisor == 0 {
        return 0;
    }
    value.div_ceil(divisor)
}
