//! Frame produced from a pyramid source.
//!
//! A `TiffFrame` is created empty; its [`TiffFrame::job`] is handed to a
//! worker which reads the tile region from the best stored level, scales it
//! to the frame size and encodes it. The frame itself only observes the
//! shared [`FrameSlot`].

use std::sync::Arc;

use tracing::{debug, trace};

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::dicom::types::DicomCompression;
use crate::image_pipeline::frame::contract::Frame;
use crate::image_pipeline::frame::encoder::{encode_tile, resize_rgb};
use crate::image_pipeline::frame::slot::{FrameBytes, FrameSlot};
use crate::image_pipeline::frame::source::{LevelInfo, PyramidSource};
use crate::image_pipeline::frame::types::{FrameFailure, FrameGeometry, FrameOutput};

pub struct TiffFrame<S: PyramidSource + 'static> {
    geometry: FrameGeometry,
    slot: Arc<FrameSlot>,
    source: Arc<S>,
    compression: DicomCompression,
    jpeg_quality: u8,
}

impl<S: PyramidSource + 'static> TiffFrame<S> {
    pub fn new(
        source: Arc<S>,
        geometry: FrameGeometry,
        compression: DicomCompression,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            geometry,
            slot: Arc::new(FrameSlot::new()),
            source,
            compression,
            jpeg_quality,
        }
    }

    /// Work item that produces this frame's bytes and completes its slot.
    pub fn job(&self) -> impl FnOnce() + Send + 'static {
        let slot = Arc::clone(&self.slot);
        let source = Arc::clone(&self.source);
        let geometry = self.geometry;
        let compression = self.compression;
        let jpeg_quality = self.jpeg_quality;
        move || {
            let result = produce(source.as_ref(), &geometry, compression, jpeg_quality)
                .map_err(|e| FrameFailure(e.to_string()));
            if let Err(failure) = &result {
                debug!(x = geometry.x, y = geometry.y, level = geometry.level, "Frame failed: {}", failure);
            }
            slot.complete(result);
        }
    }

    /// Produces the frame on the calling thread.
    pub fn slice_frame(&self) {
        (self.job())()
    }
}

impl<S: PyramidSource + 'static> Frame for TiffFrame<S> {
    fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    fn is_done(&self) -> bool {
        self.slot.is_done()
    }

    fn wait(&self) -> std::result::Result<(), FrameFailure> {
        self.slot.wait()
    }

    fn data(&self) -> FrameBytes<'_> {
        self.slot.bytes()
    }

    fn data_len(&self) -> usize {
        self.slot.len()
    }

    fn photometric_interpretation(&self) -> String {
        self.slot.photometric()
    }

    fn clear_buffer(&self) {
        self.slot.clear()
    }
}

/// Index of the stored level with the largest downsample dividing `downsample`.
pub fn source_level_for(levels: &[LevelInfo], downsample: u32) -> usize {
    levels
        .iter()
        .enumerate()
        .filter(|(_, level)| level.downsample > 0 && downsample % level.downsample == 0)
        .max_by_key(|(_, level)| level.downsample)
        .map_or(0, |(index, _)| index)
}

fn produce<S: PyramidSource + ?Sized>(
    source: &S,
    geometry: &FrameGeometry,
    compression: DicomCompression,
    jpeg_quality: u8,
) -> Result<FrameOutput> {
    let levels = source.levels();
    let level = source_level_for(levels, geometry.downsample);
    let stored_downsample = levels.get(level).map_or(1, |l| l.downsample.max(1));
    let scale = (geometry.downsample / stored_downsample).max(1);

    let region_width = geometry.width * scale;
    let region_height = geometry.height * scale;
    trace!(
        x = geometry.x,
        y = geometry.y,
        source_level = level,
        scale,
        "Reading frame region"
    );
    let rgb = source.read_region(
        level,
        geometry.x * u64::from(scale),
        geometry.y * u64::from(scale),
        region_width,
        region_height,
    )?;
    let rgb = resize_rgb(rgb, region_width, region_height, geometry.width, geometry.height)?;
    encode_tile(rgb, geometry.width, geometry.height, compression, jpeg_quality)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::common::error::ConversionError;

    /// Source whose level 0 pixels are all `value`, recording requested regions.
    struct UniformSource {
        levels: Vec<LevelInfo>,
        value: u8,
        requests: parking_lot::Mutex<Vec<(usize, u64, u64, u32, u32)>>,
        fail: bool,
    }

    impl UniformSource {
        fn new(levels: Vec<LevelInfo>, value: u8) -> Self {
            Self {
                levels,
                value,
                requests: parking_lot::Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    impl PyramidSource for UniformSource {
        fn levels(&self) -> &[LevelInfo] {
            &self.levels
        }

        fn read_region(&self, level: usize, x: u64, y: u64, width: u32, height: u32) -> Result<Vec<u8>> {
            if self.fail {
                return Err(ConversionError::DecodeError("broken tile".to_string()));
            }
            self.requests.lock().push((level, x, y, width, height));
            Ok(vec![self.value; width as usize * height as usize * 3])
        }

        fn physical_size_mm(&self) -> Option<(f64, f64)> {
            None
        }
    }

    fn level(width: u64, downsample: u32) -> LevelInfo {
        LevelInfo {
            width,
            height: width,
            downsample,
        }
    }

    fn geometry(x: u64, y: u64, downsample: u32) -> FrameGeometry {
        FrameGeometry {
            x,
            y,
            level: 1,
            width: 8,
            height: 8,
            downsample,
        }
    }

    #[test]
    fn test_source_level_selection() {
        let levels = vec![level(1024, 1), level(256, 4), level(64, 16)];
        assert_eq!(source_level_for(&levels, 1), 0);
        assert_eq!(source_level_for(&levels, 2), 0);
        assert_eq!(source_level_for(&levels, 8), 1);
        assert_eq!(source_level_for(&levels, 32), 2);
        assert_eq!(source_level_for(&levels, 6), 0);
    }

    #[test]
    fn test_downsampled_frame_reads_scaled_region() {
        let source = Arc::new(UniformSource::new(vec![level(1024, 1), level(256, 4)], 42));
        let frame = TiffFrame::new(Arc::clone(&source), geometry(16, 8, 8), DicomCompression::Raw, 80);
        assert!(!frame.is_done());

        frame.slice_frame();

        assert!(frame.is_done());
        frame.wait().unwrap();
        assert_eq!(frame.data_len(), 8 * 8 * 3);
        assert!(frame.data().iter().all(|&v| v == 42));
        assert_eq!(frame.photometric_interpretation(), "RGB");
        assert_eq!(source.requests.lock()[0], (1, 32, 16, 16, 16));

        frame.clear_buffer();
        assert_eq!(frame.data_len(), 0);
    }

    #[test]
    fn test_job_runs_on_another_thread() {
        let source = Arc::new(UniformSource::new(vec![level(64, 1)], 1));
        let frame = TiffFrame::new(source, geometry(0, 0, 1), DicomCompression::Jpeg, 80);
        std::thread::spawn(frame.job()).join().unwrap();

        frame.wait().unwrap();
        assert_eq!(frame.photometric_interpretation(), "YBR_FULL");
        assert!(frame.data_len() > 0);
    }

    #[test]
    fn test_source_failure_completes_with_error() {
        let mut source = UniformSource::new(vec![level(64, 1)], 1);
        source.fail = true;
        let frame = TiffFrame::new(Arc::new(source), geometry(0, 0, 1), DicomCompression::Raw, 80);
        frame.slice_frame();

        assert!(frame.is_done());
        let failure = frame.wait().unwrap_err();
        assert!(failure.0.contains("broken tile"));
    }
}
