//! Pyramid source reading tiled or stripped TIFF files with the tiff library.
//!
//! Every directory that is tiled and narrower than the previous level is
//! treated as a pyramid level; other directories (thumbnails, labels) are
//! skipped. Regions are assembled from decoded chunks, so only the chunks
//! overlapping a request are decoded.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use parking_lot::Mutex;
use tiff::ColorType;
use tiff::decoder::ifd::Value;
use tiff::decoder::{ChunkType, Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::{debug, info};

use crate::image_pipeline::common::div_ceil;
use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::frame::source::{LevelInfo, PyramidSource};

/// ResolutionUnit value for centimeters
const RESOLUTION_UNIT_CENTIMETER: u16 = 3;

/// Value of pixels outside the image
const BACKGROUND: u8 = 255;

#[derive(Debug, Clone, Copy)]
struct StoredLevel {
    directory: usize,
    chunk_width: u32,
    chunk_height: u32,
    color: ColorType,
}

struct DecoderState<R: Read + Seek> {
    decoder: Decoder<R>,
    directory: usize,
}

pub struct TiffPyramidSource<R: Read + Seek = BufReader<File>> {
    state: Mutex<DecoderState<R>>,
    levels: Vec<LevelInfo>,
    stored: Vec<StoredLevel>,
    physical_size_mm: Option<(f64, f64)>,
}

impl TiffPyramidSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ConversionError::InputReadError(format!("{}: {}", path.display(), e))
        })?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> TiffPyramidSource<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut decoder = Decoder::new(reader)
            .map_err(decode_error)?
            .with_limits(Limits::unlimited());

        let physical_size_mm = read_physical_size_mm(&mut decoder)?;

        let mut levels: Vec<LevelInfo> = Vec::new();
        let mut stored = Vec::new();
        let mut directory = 0;
        loop {
            let (width, height) = decoder.dimensions().map_err(decode_error)?;
            let is_level = match levels.last() {
                None => true,
                Some(previous) => {
                    matches!(decoder.get_chunk_type(), ChunkType::Tile)
                        && u64::from(width) < previous.width
                }
            };
            if is_level {
                let base_width = levels.first().map_or(u64::from(width), |l| l.width);
                let downsample = (base_width as f64 / f64::from(width.max(1))).round().max(1.0) as u32;
                let (chunk_width, chunk_height) = decoder.chunk_dimensions();
                let color = decoder.colortype().map_err(decode_error)?;
                debug!(
                    directory,
                    width, height, downsample, chunk_width, chunk_height, "Found pyramid level"
                );
                levels.push(LevelInfo {
                    width: u64::from(width),
                    height: u64::from(height),
                    downsample,
                });
                stored.push(StoredLevel {
                    directory,
                    chunk_width,
                    chunk_height,
                    color,
                });
            } else {
                debug!(directory, width, height, "Skipping non-pyramid directory");
            }

            if !decoder.more_images() {
                break;
            }
            decoder.next_image().map_err(decode_error)?;
            directory += 1;
        }

        info!(
            levels = levels.len(),
            width = levels[0].width,
            height = levels[0].height,
            "Opened TIFF pyramid"
        );

        Ok(Self {
            state: Mutex::new(DecoderState { decoder, directory }),
            levels,
            stored,
            physical_size_mm,
        })
    }
}

impl<R: Read + Seek + Send> PyramidSource for TiffPyramidSource<R> {
    fn levels(&self) -> &[LevelInfo] {
        &self.levels
    }

    fn read_region(&self, level: usize, x: u64, y: u64, width: u32, height: u32) -> Result<Vec<u8>> {
        let (info, stored) = match (self.levels.get(level), self.stored.get(level)) {
            (Some(info), Some(stored)) => (*info, *stored),
            _ => {
                return Err(ConversionError::DecodeError(format!(
                    "level {level} does not exist"
                )));
            }
        };

        let region_width = u64::from(width);
        let mut out = vec![BACKGROUND; width as usize * height as usize * 3];
        let x_end = (x + region_width).min(info.width);
        let y_end = (y + u64::from(height)).min(info.height);
        if x >= x_end || y >= y_end {
            return Ok(out);
        }

        let mut state = self.state.lock();
        if state.directory != stored.directory {
            state
                .decoder
                .seek_to_image(stored.directory)
                .map_err(decode_error)?;
            state.directory = stored.directory;
        }

        let chunk_width = u64::from(stored.chunk_width);
        let chunk_height = u64::from(stored.chunk_height);
        let chunks_across = div_ceil(info.width, chunk_width);

        for chunk_row in (y / chunk_height)..=((y_end - 1) / chunk_height) {
            for chunk_column in (x / chunk_width)..=((x_end - 1) / chunk_width) {
                let index = (chunk_row * chunks_across + chunk_column) as u32;
                let (data_width, data_height) = state.decoder.chunk_data_dimensions(index);
                let decoded = state.decoder.read_chunk(index).map_err(decode_error)?;
                let rgb = to_rgb8(decoded, stored.color)?;
                if rgb.len() < data_width as usize * data_height as usize * 3 {
                    return Err(ConversionError::DecodeError(format!(
                        "chunk {index} holds {} bytes, expected {data_width}x{data_height} RGB",
                        rgb.len()
                    )));
                }

                let data_width = u64::from(data_width);
                let chunk_x = chunk_column * chunk_width;
                let chunk_y = chunk_row * chunk_height;
                let left = x.max(chunk_x);
                let right = x_end.min(chunk_x + data_width);
                let top = y.max(chunk_y);
                let bottom = y_end.min(chunk_y + u64::from(data_height));
                if left >= right || top >= bottom {
                    continue;
                }
                let span = ((right - left) * 3) as usize;
                for row in top..bottom {
                    let src = (((row - chunk_y) * data_width + (left - chunk_x)) * 3) as usize;
                    let dst = (((row - y) * region_width + (left - x)) * 3) as usize;
                    out[dst..dst + span].copy_from_slice(&rgb[src..src + span]);
                }
            }
        }

        Ok(out)
    }

    fn physical_size_mm(&self) -> Option<(f64, f64)> {
        self.physical_size_mm
    }
}

fn decode_error(e: tiff::TiffError) -> ConversionError {
    ConversionError::DecodeError(e.to_string())
}

fn to_rgb8(decoded: DecodingResult, color: ColorType) -> Result<Vec<u8>> {
    let samples = match decoded {
        DecodingResult::U8(samples) => samples,
        _ => {
            return Err(ConversionError::UnsupportedFormat(format!(
                "{color:?} samples are not 8-bit"
            )));
        }
    };
    match color {
        ColorType::RGB(8) => Ok(samples),
        ColorType::RGBA(8) => Ok(samples
            .chunks_exact(4)
            .flat_map(|p| [p[0], p[1], p[2]])
            .collect()),
        ColorType::Gray(8) => Ok(samples.iter().flat_map(|&v| [v, v, v]).collect()),
        // JPEG compressed slides are handed over without colour conversion
        ColorType::YCbCr(8) => Ok(samples
            .chunks_exact(3)
            .flat_map(|p| ycbcr_to_rgb(p[0], p[1], p[2]))
            .collect()),
        other => Err(ConversionError::UnsupportedFormat(format!(
            "source color type {other:?}"
        ))),
    }
}

/// BT.601 full range (JFIF) YCbCr to RGB.
fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let y = f32::from(y);
    let cb = f32::from(cb) - 128.0;
    let cr = f32::from(cr) - 128.0;
    let clamp = |v: f32| v.round().clamp(0.0, 255.0) as u8;
    [
        clamp(y + 1.402 * cr),
        clamp(y - 0.344_136 * cb - 0.714_136 * cr),
        clamp(y + 1.772 * cb),
    ]
}

/// Millimeter size of the current (first) directory from its resolution tags.
///
/// Only centimeter based resolutions are trusted; inch based values are
/// usually writer defaults (72 dpi) rather than scanner calibration.
fn read_physical_size_mm<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<(f64, f64)>> {
    let unit = decoder
        .find_tag_unsigned::<u16>(Tag::ResolutionUnit)
        .map_err(decode_error)?;
    if unit != Some(RESOLUTION_UNIT_CENTIMETER) {
        return Ok(None);
    }
    let x_resolution = rational(decoder.find_tag(Tag::XResolution).map_err(decode_error)?);
    let y_resolution = rational(decoder.find_tag(Tag::YResolution).map_err(decode_error)?);
    let (width, height) = decoder.dimensions().map_err(decode_error)?;

    Ok(match (x_resolution, y_resolution) {
        (Some(x_per_cm), Some(y_per_cm)) if x_per_cm > 0.0 && y_per_cm > 0.0 => Some((
            f64::from(width) * 10.0 / x_per_cm,
            f64::from(height) * 10.0 / y_per_cm,
        )),
        _ => None,
    })
}

fn rational(value: Option<Value>) -> Option<f64> {
    match value? {
        Value::Rational(numerator, denominator) if denominator != 0 => {
            Some(f64::from(numerator) / f64::from(denominator))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tiff::encoder::{TiffEncoder, colortype};

    fn encode_rgb(width: u32, height: u32) -> Vec<u8> {
        let pixels: Vec<u8> = (0..width * height)
            .flat_map(|i| [(i % 256) as u8, (i / 256) as u8, 7])
            .collect();
        let mut buffer = Cursor::new(Vec::new());
        TiffEncoder::new(&mut buffer)
            .unwrap()
            .write_image::<colortype::RGB8>(width, height, &pixels)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_reads_single_level() {
        let source = TiffPyramidSource::new(Cursor::new(encode_rgb(40, 30))).unwrap();
        assert_eq!(source.levels().len(), 1);
        assert_eq!(source.dimensions(), (40, 30));
        assert_eq!(source.levels()[0].downsample, 1);
        assert_eq!(source.physical_size_mm(), None);
    }

    #[test]
    fn test_region_matches_source_pixels() {
        let source = TiffPyramidSource::new(Cursor::new(encode_rgb(40, 30))).unwrap();
        let region = source.read_region(0, 5, 10, 4, 2).unwrap();
        assert_eq!(region.len(), 4 * 2 * 3);

        // pixel (5, 10) has linear index 405
        assert_eq!(&region[0..3], &[(405 % 256) as u8, 1, 7]);
        // pixel (8, 11) has linear index 448
        let last = (1 * 4 + 3) * 3;
        assert_eq!(&region[last..last + 3], &[(448 % 256) as u8, 1, 7]);
    }

    #[test]
    fn test_region_outside_image_is_white() {
        let source = TiffPyramidSource::new(Cursor::new(encode_rgb(40, 30))).unwrap();
        let region = source.read_region(0, 38, 28, 4, 4).unwrap();

        // top-left 2x2 is inside, the rest is padding
        assert_eq!(region[2], 7);
        let outside = (3 * 4 + 3) * 3;
        assert_eq!(&region[outside..outside + 3], &[255, 255, 255]);
        assert!(source.read_region(0, 100, 100, 2, 2).unwrap().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_ycbcr_conversion() {
        assert_eq!(ycbcr_to_rgb(128, 128, 128), [128, 128, 128]);
        assert_eq!(ycbcr_to_rgb(255, 128, 128), [255, 255, 255]);
        assert_eq!(ycbcr_to_rgb(76, 85, 255), [254, 0, 0]);
    }

    #[test]
    fn test_ycbcr_source_is_converted_to_rgb() {
        let pixels: Vec<u8> = (0..16 * 16).flat_map(|_| [76u8, 85, 255]).collect();
        let mut buffer = Cursor::new(Vec::new());
        TiffEncoder::new(&mut buffer)
            .unwrap()
            .write_image::<colortype::YCbCr8>(16, 16, &pixels)
            .unwrap();

        let source = TiffPyramidSource::new(Cursor::new(buffer.into_inner())).unwrap();
        let region = source.read_region(0, 0, 0, 8, 8).unwrap();
        assert_eq!(region.len(), 8 * 8 * 3);
        assert!(region.chunks_exact(3).all(|p| p == [254, 0, 0]));
    }

    #[test]
    fn test_missing_level_is_an_error() {
        let source = TiffPyramidSource::new(Cursor::new(encode_rgb(8, 8))).unwrap();
        assert!(matches!(
            source.read_region(3, 0, 0, 1, 1),
            Err(ConversionError::DecodeError(_))
        ));
    }
}
