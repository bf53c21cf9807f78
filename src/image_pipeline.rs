//! Image processing pipeline module
//!
//! This module provides a structured approach to whole slide image conversion,
//! with separate modules for frame production, DICOM writing, and conversion orchestration.

pub mod frame;
pub mod dicom;
pub mod conversions;
pub mod common;

pub use common::{
    ConversionError,
    Result,
};

pub use frame::{
    Frame,
    FrameGeometry,
    FrameSlot,
    PyramidSource,
    TiffFrame,
    TiffPyramidSource,
};

pub use dicom::{
    AdditionalTags,
    ContainerWriter,
    ConversionConfig,
    ConversionConfigBuilder,
    ConversionRequest,
    DicomCompression,
    PixelData,
    StandardDicomWriter,
};

pub use conversions::{
    FileDraft,
    LevelLayout,
    WsiToDicomPipeline,
};
