use std::path::Path;

use dicom_core::value::Value;
use dicom_dictionary_std::tags;
use dicom_object::open_file;
use tiff::encoder::{TiffEncoder, colortype};
use wsi_dicom_rs::image_pipeline::{ConversionConfig, DicomCompression, WsiToDicomPipeline};

fn write_rgb_tiff(path: &Path, width: u32, height: u32) {
    let pixels: Vec<u8> = (0..height)
        .flat_map(|y| (0..width).flat_map(move |x| [(x % 256) as u8, (y % 256) as u8, 128]))
        .collect();
    let file = std::fs::File::create(path).unwrap();
    TiffEncoder::new(file)
        .unwrap()
        .write_image::<colortype::RGB8>(width, height, &pixels)
        .unwrap();
}

#[test]
fn raw_conversion_writes_readable_dicom() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("slide.tiff");
    write_rgb_tiff(&input, 100, 60);
    let output = dir.path().join("out");

    let config = ConversionConfig::builder()
        .compression(DicomCompression::Raw)
        .frame_size(32, 32)
        .frames_per_file(5)
        .tiled_full(false)
        .study_uid("1.2.826.0.1.1")
        .series_uid("1.2.826.0.1.2")
        .image_name("test slide")
        .build();
    let pipeline = WsiToDicomPipeline::new(config).unwrap();
    let written = pipeline.convert_file(&input, &output).unwrap();

    assert_eq!(written.len(), 2);
    assert_eq!(written[0], output.join("level-0-frames-0-5.dcm"));
    assert_eq!(written[1], output.join("level-0-frames-5-8.dcm"));

    let obj = open_file(&written[1]).unwrap();
    assert_eq!(
        obj.meta().transfer_syntax().trim_end_matches('\0'),
        "1.2.840.10008.1.2.1"
    );
    let int = |tag| obj.element(tag).unwrap().to_int::<u32>().unwrap();
    assert_eq!(int(tags::NUMBER_OF_FRAMES), 3);
    assert_eq!(int(tags::ROWS), 32);
    assert_eq!(int(tags::COLUMNS), 32);
    assert_eq!(int(tags::SAMPLES_PER_PIXEL), 3);
    assert_eq!(int(tags::TOTAL_PIXEL_MATRIX_COLUMNS), 100);
    assert_eq!(int(tags::TOTAL_PIXEL_MATRIX_ROWS), 60);
    assert_eq!(int(tags::CONCATENATION_FRAME_OFFSET_NUMBER), 5);
    assert_eq!(int(tags::IN_CONCATENATION_NUMBER), 2);

    let text = |tag| obj.element(tag).unwrap().to_str().unwrap().trim().to_string();
    assert_eq!(text(tags::PHOTOMETRIC_INTERPRETATION), "RGB");
    assert_eq!(text(tags::STUDY_INSTANCE_UID).trim_end_matches('\0'), "1.2.826.0.1.1");
    assert_eq!(text(tags::SERIES_DESCRIPTION), "test slide");
    assert_eq!(text(tags::DIMENSION_ORGANIZATION_TYPE), "TILED_SPARSE");

    let pixels = obj.element(tags::PIXEL_DATA).unwrap().to_bytes().unwrap();
    assert_eq!(pixels.len(), 3 * 32 * 32 * 3);
    // frame 5 is the second tile of the second row, its first pixel is (32, 32)
    assert_eq!(&pixels[0..3], &[32, 32, 128]);
}

#[test]
fn jpeg_conversion_writes_encapsulated_frames() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("slide.tiff");
    write_rgb_tiff(&input, 64, 64);

    let config = ConversionConfig::builder()
        .compression(DicomCompression::Jpeg)
        .frame_size(32, 32)
        .downsamples(vec![1, 2])
        .build();
    let pipeline = WsiToDicomPipeline::new(config).unwrap();
    let written = pipeline.convert_file(&input, dir.path()).unwrap();

    assert_eq!(written.len(), 2);
    assert!(written[1].ends_with("level-1-frames-0-1.dcm"));

    let obj = open_file(&written[0]).unwrap();
    assert_eq!(
        obj.meta().transfer_syntax().trim_end_matches('\0'),
        "1.2.840.10008.1.2.4.50"
    );
    assert_eq!(
        obj.element(tags::PHOTOMETRIC_INTERPRETATION).unwrap().to_str().unwrap().trim(),
        "YBR_FULL"
    );
    match obj.element(tags::PIXEL_DATA).unwrap().value() {
        Value::PixelSequence(sequence) => {
            assert_eq!(sequence.fragments().len(), 4);
            assert_eq!(sequence.offset_table().len(), 4);
            assert_eq!(sequence.offset_table()[0], 0);
            for fragment in sequence.fragments() {
                assert_eq!(&fragment[..2], &[0xFF, 0xD8]);
            }
        }
        _ => panic!("expected encapsulated pixel data"),
    }
}
