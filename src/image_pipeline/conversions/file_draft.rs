//! Assembly of one output file from an ordered batch of frames.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::image_pipeline::common::div_ceil;
use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::dicom::image_info::{ImageDataInfo, StudyIdentifiers, default_photometric};
use crate::image_pipeline::dicom::pixel_data::{EncapsulatedPixelData, PixelData};
use crate::image_pipeline::dicom::tags::AdditionalTags;
use crate::image_pipeline::dicom::types::DicomCompression;
use crate::image_pipeline::dicom::writer::{ContainerWriter, ConversionRequest};
use crate::image_pipeline::frame::Frame;

/// Notional bytes per pixel of the uncompressed image, used for the ratio only
const UNCOMPRESSED_BYTES_PER_PIXEL: f64 = 3.0;

/// Settings shared by every file of one pyramid level
#[derive(Debug, Clone)]
pub struct LevelLayout {
    pub output_dir: PathBuf,
    pub image_width: u64,
    pub image_height: u64,
    pub level: u32,
    pub identifiers: StudyIdentifiers,
    pub compression: DicomCompression,
    pub tiled: bool,
    pub additional_tags: Option<Arc<AdditionalTags>>,
    pub first_level_width_mm: f64,
    pub first_level_height_mm: f64,
    pub downsample: u32,
}

/// One output file covering a contiguous frame range of a level.
pub struct FileDraft {
    frames: Vec<Box<dyn Frame>>,
    layout: LevelLayout,
    row: u64,
    column: u64,
    batch_number: usize,
    prior_batch_frames: usize,
    frame_width: u32,
    frame_height: u32,
}

impl FileDraft {
    /// Takes ownership of `frames`, already scheduled for production.
    ///
    /// `prior_batches` are the drafts previously built for the same level;
    /// only their frame counts are read.
    pub fn new(
        frames: Vec<Box<dyn Frame>>,
        layout: LevelLayout,
        row: u64,
        column: u64,
        prior_batches: &[FileDraft],
    ) -> Self {
        let prior_batch_frames = prior_batches.iter().map(FileDraft::file_frame_count).sum();
        let (frame_width, frame_height) = frames
            .first()
            .map_or((0, 0), |frame| (frame.frame_width(), frame.frame_height()));

        Self {
            frames,
            layout,
            row,
            column,
            batch_number: prior_batches.len(),
            prior_batch_frames,
            frame_width,
            frame_height,
        }
    }

    pub fn file_frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn prior_frame_count(&self) -> usize {
        self.prior_batch_frames
    }

    pub fn batch_number(&self) -> usize {
        self.batch_number
    }

    pub fn frame_width(&self) -> u32 {
        self.frame_width
    }

    pub fn frame_height(&self) -> u32 {
        self.frame_height
    }

    pub fn image_width(&self) -> u64 {
        self.layout.image_width
    }

    pub fn image_height(&self) -> u64 {
        self.layout.image_height
    }

    pub fn level(&self) -> u32 {
        self.layout.level
    }

    pub fn downsample(&self) -> u32 {
        self.layout.downsample
    }

    pub fn frame(&self, index: usize) -> Option<&dyn Frame> {
        self.frames.get(index).map(|frame| frame.as_ref())
    }

    /// Frame tiles across one row of the level
    pub fn tiles_per_row(&self) -> u64 {
        div_ceil(self.layout.image_width, u64::from(self.frame_width))
    }

    /// Frame tiles needed to cover the whole level
    pub fn total_tiles(&self) -> u64 {
        self.tiles_per_row() * div_ceil(self.layout.image_height, u64::from(self.frame_height))
    }

    /// `level-<L>-frames-<start>-<end>.dcm`, the end being exclusive
    pub fn file_name(&self) -> String {
        format!(
            "level-{}-frames-{}-{}.dcm",
            self.layout.level,
            self.prior_batch_frames,
            self.prior_batch_frames + self.file_frame_count()
        )
    }

    pub fn output_path(&self) -> PathBuf {
        self.layout.output_dir.join(self.file_name())
    }

    /// Waits for every frame in order, assembles the pixel data and hands the
    /// file to `writer`. Frame buffers are released as they are consumed.
    #[instrument(skip_all, fields(level = self.layout.level, batch = self.batch_number, frames = self.frames.len()))]
    pub fn write(&self, writer: &dyn ContainerWriter, output: &mut dyn Write) -> Result<()> {
        let compression = self.layout.compression;
        let mut native = Vec::new();
        let mut encapsulated = EncapsulatedPixelData::new();
        let mut photometric = String::new();
        let mut stored_bytes: u64 = 0;

        for (index, frame) in self.frames.iter().enumerate() {
            if let Err(failure) = frame.wait() {
                // finished frames after the failed one would otherwise stay resident
                for rest in &self.frames[index..] {
                    rest.clear_buffer();
                }
                return Err(ConversionError::FrameProductionError {
                    index: self.prior_batch_frames + index,
                    reason: failure.0,
                });
            }

            let frame_photometric = frame.photometric_interpretation();
            if index == 0 {
                photometric = frame_photometric;
            } else if frame_photometric != photometric {
                warn!(
                    frame = self.prior_batch_frames + index,
                    expected = %photometric,
                    found = %frame_photometric,
                    "Photometric interpretation differs within file, keeping the first"
                );
            }

            {
                let bytes = frame.data();
                if compression.is_encapsulated() {
                    encapsulated.push_frame(&bytes);
                } else {
                    native.extend_from_slice(&bytes);
                }
                stored_bytes += bytes.len() as u64;
            }
            frame.clear_buffer();
        }

        if photometric.is_empty() {
            photometric = default_photometric(compression).to_string();
        }
        let columns = u16::try_from(self.frame_width).map_err(|_| {
            ConversionError::InvalidDimensions(self.frame_width as usize, self.frame_height as usize)
        })?;
        let rows = u16::try_from(self.frame_height).map_err(|_| {
            ConversionError::InvalidDimensions(self.frame_width as usize, self.frame_height as usize)
        })?;
        let mut image_info = ImageDataInfo::interleaved_8bit(compression, photometric, columns, rows);
        if stored_bytes > 0 {
            let uncompressed = UNCOMPRESSED_BYTES_PER_PIXEL
                * self.layout.image_height as f64
                * self.layout.image_width as f64;
            image_info.compression_ratio = format!("{:.6}", uncompressed / stored_bytes as f64);
        }

        let pixel_data = if compression.is_encapsulated() {
            PixelData::Encapsulated(encapsulated)
        } else {
            PixelData::Native(native)
        };
        debug!(
            stored_bytes,
            ratio = %image_info.compression_ratio,
            "Pixel data assembled"
        );

        let request = ConversionRequest {
            image_width: self.layout.image_width,
            image_height: self.layout.image_height,
            tiles_per_row: self.tiles_per_row(),
            identifiers: self.layout.identifiers.clone(),
            pixel_data,
            image_info,
            batch_size: self.file_frame_count(),
            row: self.row,
            column: self.column,
            level: self.layout.level,
            batch_number: self.batch_number,
            first_frame_number: self.prior_batch_frames,
            total_tiles: self.total_tiles(),
            tiled: self.layout.tiled,
            additional_tags: self.layout.additional_tags.clone(),
            first_level_width_mm: self.layout.first_level_width_mm,
            first_level_height_mm: self.layout.first_level_height_mm,
            downsample: self.layout.downsample,
        };
        writer.write_container(request, output)
    }

    /// Writes the file into the level's output directory and returns its path.
    pub fn save_file(&self, writer: &dyn ContainerWriter) -> Result<PathBuf> {
        let path = self.output_path();
        let file = File::create(&path).map_err(|e| {
            ConversionError::OutputWriteError(format!("{}: {}", path.display(), e))
        })?;
        let mut output = BufWriter::new(file);
        self.write(writer, &mut output)?;
        output.flush()?;

        info!(path = %path.display(), frames = self.file_frame_count(), "Wrote file");
        Ok(path)
    }
}
