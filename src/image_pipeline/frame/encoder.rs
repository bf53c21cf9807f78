use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::dicom::image_info::{PHOTOMETRIC_RGB, PHOTOMETRIC_YBR_FULL};
use crate::image_pipeline::dicom::types::DicomCompression;
use crate::image_pipeline::frame::types::FrameOutput;

/// Scales an interleaved RGB8 buffer to `width` x `height`.
pub fn resize_rgb(
    rgb: Vec<u8>,
    source_width: u32,
    source_height: u32,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    if (source_width, source_height) == (width, height) {
        return Ok(rgb);
    }
    let image = RgbImage::from_raw(source_width, source_height, rgb).ok_or(
        ConversionError::InvalidDimensions(source_width as usize, source_height as usize),
    )?;
    Ok(imageops::resize(&image, width, height, FilterType::Triangle).into_raw())
}

/// Encodes one interleaved RGB8 tile in the representation stored in the file.
pub fn encode_tile(
    rgb: Vec<u8>,
    width: u32,
    height: u32,
    compression: DicomCompression,
    jpeg_quality: u8,
) -> Result<FrameOutput> {
    match compression {
        DicomCompression::Raw => Ok(FrameOutput {
            bytes: rgb,
            photometric: PHOTOMETRIC_RGB.to_string(),
        }),
        // the encoder keeps full chroma resolution (4:4:4)
        DicomCompression::Jpeg => {
            let mut bytes = Vec::new();
            let mut encoder = JpegEncoder::new_with_quality(&mut bytes, jpeg_quality);
            encoder
                .encode(&rgb, width, height, ExtendedColorType::Rgb8)
                .map_err(|e| ConversionError::EncodeError(e.to_string()))?;
            Ok(FrameOutput {
                bytes,
                photometric: PHOTOMETRIC_YBR_FULL.to_string(),
            })
        }
        DicomCompression::Jpeg2000 => Err(ConversionError::UnsupportedFormat(
            "JPEG 2000 tile encoding is not available".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_passthrough() {
        let rgb = vec![10u8; 4 * 4 * 3];
        let output = encode_tile(rgb.clone(), 4, 4, DicomCompression::Raw, 80).unwrap();
        assert_eq!(output.bytes, rgb);
        assert_eq!(output.photometric, "RGB");
    }

    #[test]
    fn test_jpeg_output_has_markers() {
        let rgb = vec![128u8; 16 * 16 * 3];
        let output = encode_tile(rgb, 16, 16, DicomCompression::Jpeg, 90).unwrap();
        assert_eq!(&output.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(&output.bytes[output.bytes.len() - 2..], &[0xFF, 0xD9]);
        assert_eq!(output.photometric, "YBR_FULL");
    }

    /// Horizontal/vertical sampling factor byte of each component in the SOF0 header
    fn sof0_sampling_factors(jpeg: &[u8]) -> Vec<u8> {
        let marker = jpeg
            .windows(2)
            .position(|w| w == [0xFF, 0xC0])
            .expect("baseline SOF0 marker");
        let components = jpeg[marker + 9] as usize;
        (0..components)
            .map(|i| jpeg[marker + 10 + i * 3 + 1])
            .collect()
    }

    #[test]
    fn test_jpeg_photometric_matches_chroma_sampling() {
        let rgb: Vec<u8> = (0..32 * 32).flat_map(|i| [(i % 256) as u8, 40, 200]).collect();
        let output = encode_tile(rgb, 32, 32, DicomCompression::Jpeg, 80).unwrap();

        let factors = sof0_sampling_factors(&output.bytes);
        assert_eq!(factors.len(), 3);
        // luma and both chroma planes share one sampling factor: no subsampling
        assert!(factors.iter().all(|&f| f == factors[0]));
        assert_eq!(output.photometric, "YBR_FULL");
    }

    #[test]
    fn test_jpeg2000_is_unsupported() {
        let result = encode_tile(vec![0; 3], 1, 1, DicomCompression::Jpeg2000, 80);
        assert!(matches!(result, Err(ConversionError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_resize_halves_tile() {
        let rgb = vec![200u8; 8 * 8 * 3];
        let resized = resize_rgb(rgb, 8, 8, 4, 4).unwrap();
        assert_eq!(resized.len(), 4 * 4 * 3);
        assert!(resized.iter().all(|&v| v == 200));
    }

    #[test]
    fn test_resize_rejects_short_buffer() {
        assert!(resize_rgb(vec![0; 5], 8, 8, 4, 4).is_err());
    }
}
