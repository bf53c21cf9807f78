//! DICOM conversion configuration types

use std::path::PathBuf;

use crate::image_pipeline::common::error::{ConversionError, Result};

/// Pixel data encodings a file can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DicomCompression {
    /// Native pixel data, frames concatenated as interleaved RGB
    Raw,
    /// JPEG baseline (process 1), encapsulated
    Jpeg,
    /// JPEG 2000 lossless, encapsulated
    Jpeg2000,
}

impl DicomCompression {
    /// Whether frames are stored as fragments of an encapsulated sequence
    pub fn is_encapsulated(self) -> bool {
        !matches!(self, DicomCompression::Raw)
    }
}

impl std::str::FromStr for DicomCompression {
    type Err = ConversionError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "raw" | "none" => Ok(DicomCompression::Raw),
            "jpeg" => Ok(DicomCompression::Jpeg),
            "jpeg2000" | "j2k" => Ok(DicomCompression::Jpeg2000),
            other => Err(ConversionError::ConfigError(format!(
                "unknown compression '{other}'"
            ))),
        }
    }
}

/// Configuration for whole-slide TIFF to DICOM conversion
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Pixel data encoding of every written file
    pub compression: DicomCompression,
    /// Width of one frame (tile) in pixels
    pub frame_width: u32,
    /// Height of one frame (tile) in pixels
    pub frame_height: u32,
    /// Maximum number of frames per output file, 0 keeps a level in one file
    pub frames_per_file: usize,
    /// One output level per entry, relative to the full resolution image
    pub downsamples: Vec<u32>,
    /// Quality used by the JPEG frame encoder (1-100)
    pub jpeg_quality: u8,
    /// Worker threads producing frames, `None` lets rayon decide
    pub threads: Option<usize>,
    /// Emit TILED_FULL organisation instead of per-frame positions
    pub tiled_full: bool,
    /// Study instance UID shared by all files, generated when empty
    pub study_uid: String,
    /// Series instance UID shared by all files, generated when empty
    pub series_uid: String,
    /// Written as the series description
    pub image_name: String,
    /// JSON file with additional tags applied to every file
    pub tags_file: Option<PathBuf>,
    /// Fallback resolution when the source carries none
    pub microns_per_pixel: f64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            compression: DicomCompression::Jpeg,
            frame_width: 256,
            frame_height: 256,
            frames_per_file: 0,
            downsamples: vec![1],
            jpeg_quality: 80,
            threads: None,
            tiled_full: true,
            study_uid: String::new(),
            series_uid: String::new(),
            image_name: String::new(),
            tags_file: None,
            microns_per_pixel: 0.25,
        }
    }
}

impl ConversionConfig {
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(ConversionError::InvalidDimensions(
                self.frame_width as usize,
                self.frame_height as usize,
            ));
        }
        if self.downsamples.is_empty() {
            return Err(ConversionError::ConfigError(
                "at least one downsample is required".to_string(),
            ));
        }
        if self.downsamples.contains(&0) {
            return Err(ConversionError::ConfigError(
                "downsample factors must be >= 1".to_string(),
            ));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ConversionError::ConfigError(format!(
                "jpeg quality {} is outside 1..=100",
                self.jpeg_quality
            )));
        }
        if self.threads == Some(0) {
            return Err(ConversionError::ConfigError(
                "threads must be >= 1 when set".to_string(),
            ));
        }
        if !(self.microns_per_pixel > 0.0) {
            return Err(ConversionError::ConfigError(
                "microns per pixel must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for ConversionConfig
#[derive(Default)]
pub struct ConversionConfigBuilder {
    compression: Option<DicomCompression>,
    frame_size: Option<(u32, u32)>,
    frames_per_file: Option<usize>,
    downsamples: Option<Vec<u32>>,
    jpeg_quality: Option<u8>,
    threads: Option<Option<usize>>,
    tiled_full: Option<bool>,
    study_uid: Option<String>,
    series_uid: Option<String>,
    image_name: Option<String>,
    tags_file: Option<Option<PathBuf>>,
    microns_per_pixel: Option<f64>,
}

impl ConversionConfigBuilder {
    pub fn compression(mut self, compression: DicomCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = Some((width, height));
        self
    }

    pub fn frames_per_file(mut self, frames: usize) -> Self {
        self.frames_per_file = Some(frames);
        self
    }

    pub fn downsamples(mut self, downsamples: Vec<u32>) -> Self {
        self.downsamples = Some(downsamples);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = Some(quality);
        self
    }

    pub fn threads(mut self, threads: Option<usize>) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn tiled_full(mut self, tiled: bool) -> Self {
        self.tiled_full = Some(tiled);
        self
    }

    pub fn study_uid(mut self, uid: impl Into<String>) -> Self {
        self.study_uid = Some(uid.into());
        self
    }

    pub fn series_uid(mut self, uid: impl Into<String>) -> Self {
        self.series_uid = Some(uid.into());
        self
    }

    pub fn image_name(mut self, name: impl Into<String>) -> Self {
        self.image_name = Some(name.into());
        self
    }

    pub fn tags_file(mut self, path: Option<PathBuf>) -> Self {
        self.tags_file = Some(path);
        self
    }

    pub fn microns_per_pixel(mut self, mpp: f64) -> Self {
        self.microns_per_pixel = Some(mpp);
        self
    }

    pub fn build(self) -> ConversionConfig {
        let default = ConversionConfig::default();
        let (frame_width, frame_height) = self
            .frame_size
            .unwrap_or((default.frame_width, default.frame_height));
        ConversionConfig {
            compression: self.compression.unwrap_or(default.compression),
            frame_width,
            frame_height,
            frames_per_file: self.frames_per_file.unwrap_or(default.frames_per_file),
            downsamples: self.downsamples.unwrap_or(default.downsamples),
            jpeg_quality: self.jpeg_quality.unwrap_or(default.jpeg_quality),
            threads: self.threads.unwrap_or(default.threads),
            tiled_full: self.tiled_full.unwrap_or(default.tiled_full),
            study_uid: self.study_uid.unwrap_or(default.study_uid),
            series_uid: self.series_uid.unwrap_or(default.series_uid),
            image_name: self.image_name.unwrap_or(default.image_name),
            tags_file: self.tags_file.unwrap_or(default.tags_file),
            microns_per_pixel: self.microns_per_pixel.unwrap_or(default.microns_per_pixel),
        }
    }
}
