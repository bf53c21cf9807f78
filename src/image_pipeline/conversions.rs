//! Pipeline conversions module
//!
//! This module contains the multi-frame file assembly and the orchestration
//! of whole slide conversions.

mod file_draft;
mod wsi_to_dicom;


pub use file_draft::{FileDraft, LevelLayout};
pub use wsi_to_dicom::WsiToDicomPipeline;
