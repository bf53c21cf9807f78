//! DICOM writing module
//!
//! This module provides the pixel data payload types, the container writer
//! abstraction and a dicom-object based writer for whole slide images.

pub mod writer;
mod standard_dicom_writer;
pub mod image_info;
pub mod pixel_data;
pub mod tags;
pub mod types;
pub mod uid;

pub use writer::{ContainerWriter, ConversionRequest};
pub use standard_dicom_writer::StandardDicomWriter;
pub use image_info::{ImageDataInfo, StudyIdentifiers};
pub use pixel_data::{EncapsulatedPixelData, PixelData};
pub use tags::{AdditionalTags, TagOverride};
pub use types::{ConversionConfig, ConversionConfigBuilder, DicomCompression};
