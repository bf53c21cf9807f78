use std::io::Write;

use dicom_core::value::{DataSetSequence, PixelFragmentSequence};
use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::tags;
use dicom_object::{FileMetaTableBuilder, InMemDicomObject};
use tracing::{debug, warn};

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::dicom::image_info::JPEG_BASELINE_PROCESS_1;
use crate::image_pipeline::dicom::pixel_data::PixelData;
use crate::image_pipeline::dicom::uid::{derive_uid, generate_uid};
use crate::image_pipeline::dicom::writer::{ContainerWriter, ConversionRequest};

pub const VL_WHOLE_SLIDE_MICROSCOPY_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.77.1.6";

/// Writes VL Whole Slide Microscopy Image files with dicom-object.
pub struct StandardDicomWriter;

impl ContainerWriter for StandardDicomWriter {
    fn write_container(&self, request: ConversionRequest, output: &mut dyn Write) -> Result<()> {
        debug!(
            level = request.level,
            batch = request.batch_number,
            frames = request.batch_size,
            "Encoding DICOM file"
        );

        let sop_instance_uid = generate_uid();
        let transfer_syntax = request.image_info.transfer_syntax;
        let dataset = build_dataset(request, &sop_instance_uid);

        let meta = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid(VL_WHOLE_SLIDE_MICROSCOPY_IMAGE_STORAGE)
            .media_storage_sop_instance_uid(sop_instance_uid.as_str())
            .transfer_syntax(transfer_syntax);
        let file = dataset
            .with_meta(meta)
            .map_err(|e| ConversionError::DicomError(e.to_string()))?;

        file.write_all(&mut *output)
            .map_err(|e| ConversionError::OutputWriteError(e.to_string()))?;

        debug!("DICOM encoding complete");
        Ok(())
    }
}

fn build_dataset(request: ConversionRequest, sop_instance_uid: &str) -> InMemDicomObject {
    let mut obj = InMemDicomObject::new_empty();
    let info = &request.image_info;

    let study_uid = uid_or_generated(&request.identifiers.study_uid, "study");
    let series_uid = uid_or_generated(&request.identifiers.series_uid, "series");

    put_str(&mut obj, tags::SOP_CLASS_UID, VR::UI, VL_WHOLE_SLIDE_MICROSCOPY_IMAGE_STORAGE);
    put_str(&mut obj, tags::SOP_INSTANCE_UID, VR::UI, sop_instance_uid);
    put_str(&mut obj, tags::STUDY_INSTANCE_UID, VR::UI, &study_uid);
    put_str(&mut obj, tags::SERIES_INSTANCE_UID, VR::UI, &series_uid);
    put_str(&mut obj, tags::MODALITY, VR::CS, "SM");
    put_str(&mut obj, tags::PATIENT_NAME, VR::PN, "");
    put_str(&mut obj, tags::PATIENT_ID, VR::LO, "");
    put_str(&mut obj, tags::SERIES_NUMBER, VR::IS, "1");
    put_str(
        &mut obj,
        tags::INSTANCE_NUMBER,
        VR::IS,
        &(request.batch_number + 1).to_string(),
    );
    if !request.identifiers.image_name.is_empty() {
        put_str(&mut obj, tags::SERIES_DESCRIPTION, VR::LO, &request.identifiers.image_name);
    }

    let image_type: &[&str] = if request.level == 0 {
        &["ORIGINAL", "PRIMARY", "VOLUME", "NONE"]
    } else {
        &["DERIVED", "PRIMARY", "VOLUME", "RESAMPLED"]
    };
    put_strs(&mut obj, tags::IMAGE_TYPE, VR::CS, image_type.iter().map(|s| s.to_string()).collect());

    // Image pixel module
    put_u16(&mut obj, tags::SAMPLES_PER_PIXEL, info.samples_per_pixel);
    put_str(&mut obj, tags::PHOTOMETRIC_INTERPRETATION, VR::CS, &info.photometric_interpretation);
    put_u16(&mut obj, tags::PLANAR_CONFIGURATION, info.planar_configuration);
    put_u16(&mut obj, tags::ROWS, info.rows);
    put_u16(&mut obj, tags::COLUMNS, info.columns);
    put_u16(&mut obj, tags::BITS_ALLOCATED, info.bits_allocated);
    put_u16(&mut obj, tags::BITS_STORED, info.bits_stored);
    put_u16(&mut obj, tags::HIGH_BIT, info.high_bit);
    put_u16(&mut obj, tags::PIXEL_REPRESENTATION, info.pixel_representation);
    put_str(&mut obj, tags::NUMBER_OF_FRAMES, VR::IS, &request.batch_size.to_string());

    if info.transfer_syntax == JPEG_BASELINE_PROCESS_1 {
        put_str(&mut obj, tags::LOSSY_IMAGE_COMPRESSION, VR::CS, "01");
        put_str(&mut obj, tags::LOSSY_IMAGE_COMPRESSION_METHOD, VR::CS, "ISO_10918_1");
        if !info.compression_ratio.is_empty() {
            put_str(&mut obj, tags::LOSSY_IMAGE_COMPRESSION_RATIO, VR::DS, &info.compression_ratio);
        }
    } else {
        put_str(&mut obj, tags::LOSSY_IMAGE_COMPRESSION, VR::CS, "00");
    }

    // Whole slide geometry
    obj.put(DataElement::new(
        tags::TOTAL_PIXEL_MATRIX_COLUMNS,
        VR::UL,
        PrimitiveValue::from(request.image_width as u32),
    ));
    obj.put(DataElement::new(
        tags::TOTAL_PIXEL_MATRIX_ROWS,
        VR::UL,
        PrimitiveValue::from(request.image_height as u32),
    ));
    obj.put(DataElement::new(
        tags::IMAGED_VOLUME_WIDTH,
        VR::FL,
        PrimitiveValue::from(request.first_level_width_mm as f32),
    ));
    obj.put(DataElement::new(
        tags::IMAGED_VOLUME_HEIGHT,
        VR::FL,
        PrimitiveValue::from(request.first_level_height_mm as f32),
    ));
    put_shared_functional_groups(&mut obj, &request);

    let dimension_organization = if request.tiled { "TILED_FULL" } else { "TILED_SPARSE" };
    put_str(&mut obj, tags::DIMENSION_ORGANIZATION_TYPE, VR::CS, dimension_organization);
    if !request.tiled {
        put_per_frame_positions(&mut obj, &request);
    }

    let covers_whole_level =
        request.first_frame_number == 0 && request.batch_size as u64 >= request.total_tiles;
    if !covers_whole_level {
        put_str(
            &mut obj,
            tags::CONCATENATION_UID,
            VR::UI,
            &derive_uid(&series_uid, &format!("level-{}", request.level)),
        );
        put_u16(&mut obj, tags::IN_CONCATENATION_NUMBER, (request.batch_number + 1) as u16);
        obj.put(DataElement::new(
            tags::CONCATENATION_FRAME_OFFSET_NUMBER,
            VR::UL,
            PrimitiveValue::from(request.first_frame_number as u32),
        ));
    }

    if let Some(additional) = &request.additional_tags {
        for entry in additional.iter() {
            put_strs(&mut obj, entry.tag, entry.vr, entry.values.clone());
        }
    }

    match request.pixel_data {
        PixelData::Native(mut bytes) => {
            if bytes.len() % 2 == 1 {
                bytes.push(0);
            }
            obj.put(DataElement::new(tags::PIXEL_DATA, VR::OB, PrimitiveValue::from(bytes)));
        }
        PixelData::Encapsulated(sequence) => {
            obj.put(DataElement::new(
                tags::PIXEL_DATA,
                VR::OB,
                PixelFragmentSequence::new(sequence.offset_table, sequence.fragments),
            ));
        }
    }

    obj
}

fn put_shared_functional_groups(obj: &mut InMemDicomObject, request: &ConversionRequest) {
    if request.image_width == 0 || request.image_height == 0 {
        return;
    }
    let column_spacing = request.first_level_width_mm / request.image_width as f64;
    let row_spacing = request.first_level_height_mm / request.image_height as f64;

    let pixel_measures = InMemDicomObject::from_element_iter([DataElement::new(
        tags::PIXEL_SPACING,
        VR::DS,
        PrimitiveValue::Strs(vec![format_ds(row_spacing), format_ds(column_spacing)].into()),
    )]);
    let shared = InMemDicomObject::from_element_iter([DataElement::new(
        tags::PIXEL_MEASURES_SEQUENCE,
        VR::SQ,
        DataSetSequence::from(vec![pixel_measures]),
    )]);
    obj.put(DataElement::new(
        tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE,
        VR::SQ,
        DataSetSequence::from(vec![shared]),
    ));
}

fn put_per_frame_positions(obj: &mut InMemDicomObject, request: &ConversionRequest) {
    if request.tiles_per_row == 0 {
        return;
    }
    let tile_width = u64::from(request.image_info.columns);
    let tile_height = u64::from(request.image_info.rows);
    let anchor = request.row * request.tiles_per_row + request.column;

    let items: Vec<InMemDicomObject> = (0..request.batch_size as u64)
        .map(|offset| {
            let tile = anchor + offset;
            let column = (tile % request.tiles_per_row) * tile_width + 1;
            let row = (tile / request.tiles_per_row) * tile_height + 1;
            let position = InMemDicomObject::from_element_iter([
                DataElement::new(
                    tags::COLUMN_POSITION_IN_TOTAL_IMAGE_PIXEL_MATRIX,
                    VR::SL,
                    PrimitiveValue::from(column as i32),
                ),
                DataElement::new(
                    tags::ROW_POSITION_IN_TOTAL_IMAGE_PIXEL_MATRIX,
                    VR::SL,
                    PrimitiveValue::from(row as i32),
                ),
            ]);
            InMemDicomObject::from_element_iter([DataElement::new(
                tags::PLANE_POSITION_SLIDE_SEQUENCE,
                VR::SQ,
                DataSetSequence::from(vec![position]),
            )])
        })
        .collect();

    obj.put(DataElement::new(
        tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE,
        VR::SQ,
        DataSetSequence::from(items),
    ));
}

fn uid_or_generated(uid: &str, what: &str) -> String {
    if uid.is_empty() {
        warn!("No {} UID supplied, generating one for this file only", what);
        generate_uid()
    } else {
        uid.to_string()
    }
}

/// Decimal strings are limited to 16 characters.
fn format_ds(value: f64) -> String {
    let mut text = format!("{value:.10}");
    text.truncate(16);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn put_str(obj: &mut InMemDicomObject, tag: Tag, vr: VR, value: &str) {
    obj.put(DataElement::new(tag, vr, PrimitiveValue::from(value)));
}

fn put_strs(obj: &mut InMemDicomObject, tag: Tag, vr: VR, values: Vec<String>) {
    obj.put(DataElement::new(tag, vr, PrimitiveValue::Strs(values.into())));
}

fn put_u16(obj: &mut InMemDicomObject, tag: Tag, value: u16) {
    obj.put(DataElement::new(tag, VR::US, PrimitiveValue::from(value)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ds_fits_sixteen_characters() {
        assert_eq!(format_ds(0.00025), "0.00025");
        assert_eq!(format_ds(0.5), "0.5");
        assert!(format_ds(1234.567891234567).len() <= 16);
        assert_eq!(format_ds(2.0), "2");
    }
}
