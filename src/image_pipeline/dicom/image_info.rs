//! Image pixel description handed to the container writer

use crate::image_pipeline::dicom::types::DicomCompression;

pub const PHOTOMETRIC_RGB: &str = "RGB";
pub const PHOTOMETRIC_YBR_FULL: &str = "YBR_FULL";
pub const PHOTOMETRIC_YBR_FULL_422: &str = "YBR_FULL_422";

pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
pub const JPEG_BASELINE_PROCESS_1: &str = "1.2.840.10008.1.2.4.50";
pub const JPEG_2000_LOSSLESS_ONLY: &str = "1.2.840.10008.1.2.4.90";

/// Transfer syntax UID used for files carrying `compression`
pub fn transfer_syntax_for(compression: DicomCompression) -> &'static str {
    match compression {
        DicomCompression::Jpeg => JPEG_BASELINE_PROCESS_1,
        DicomCompression::Jpeg2000 => JPEG_2000_LOSSLESS_ONLY,
        DicomCompression::Raw => EXPLICIT_VR_LITTLE_ENDIAN,
    }
}

/// Photometric interpretation assumed when no frame reported one
pub fn default_photometric(compression: DicomCompression) -> &'static str {
    match compression {
        DicomCompression::Jpeg => PHOTOMETRIC_YBR_FULL_422,
        DicomCompression::Jpeg2000 | DicomCompression::Raw => PHOTOMETRIC_RGB,
    }
}

/// Image pixel module values of one file
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDataInfo {
    pub transfer_syntax: &'static str,
    pub photometric_interpretation: String,
    pub samples_per_pixel: u16,
    pub planar_configuration: u16,
    /// Frame height
    pub rows: u16,
    /// Frame width
    pub columns: u16,
    pub bits_allocated: u16,
    pub bits_stored: u16,
    pub high_bit: u16,
    pub pixel_representation: u16,
    /// Informational ratio against 3 bytes per pixel, empty when nothing was stored
    pub compression_ratio: String,
}

impl ImageDataInfo {
    /// 8-bit interleaved RGB-like samples, the only layout frames are produced in
    pub fn interleaved_8bit(
        compression: DicomCompression,
        photometric_interpretation: impl Into<String>,
        columns: u16,
        rows: u16,
    ) -> Self {
        Self {
            transfer_syntax: transfer_syntax_for(compression),
            photometric_interpretation: photometric_interpretation.into(),
            samples_per_pixel: 3,
            planar_configuration: 0,
            rows,
            columns,
            bits_allocated: 8,
            bits_stored: 8,
            high_bit: 7,
            pixel_representation: 0,
            compression_ratio: String::new(),
        }
    }
}

/// Study, series and image identification shared by all files of a slide
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudyIdentifiers {
    pub study_uid: String,
    pub series_uid: String,
    pub image_name: String,
}
