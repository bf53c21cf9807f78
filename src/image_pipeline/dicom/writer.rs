use std::io::Write;
use std::sync::Arc;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::dicom::image_info::{ImageDataInfo, StudyIdentifiers};
use crate::image_pipeline::dicom::pixel_data::PixelData;
use crate::image_pipeline::dicom::tags::AdditionalTags;

/// Everything a container writer needs to serialize one file of a level.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub image_width: u64,
    pub image_height: u64,
    pub tiles_per_row: u64,
    pub identifiers: StudyIdentifiers,
    pub pixel_data: PixelData,
    pub image_info: ImageDataInfo,
    /// Frames stored in this file
    pub batch_size: usize,
    /// Tile row of the first frame
    pub row: u64,
    /// Tile column of the first frame
    pub column: u64,
    pub level: u32,
    /// Index of this file among the files of the level
    pub batch_number: usize,
    /// Zero based number of the first frame within the level
    pub first_frame_number: usize,
    pub total_tiles: u64,
    pub tiled: bool,
    pub additional_tags: Option<Arc<AdditionalTags>>,
    pub first_level_width_mm: f64,
    pub first_level_height_mm: f64,
    pub downsample: u32,
}

pub trait ContainerWriter: Send + Sync {
    fn write_container(&self, request: ConversionRequest, output: &mut dyn Write) -> Result<()>;
}
