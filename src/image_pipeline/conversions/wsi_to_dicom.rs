use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument};

use crate::image_pipeline::{
    common::div_ceil,
    common::error::{ConversionError, Result},
    conversions::file_draft::{FileDraft, LevelLayout},
    dicom::{
        AdditionalTags, ContainerWriter, ConversionConfig, StandardDicomWriter, StudyIdentifiers,
        uid::generate_uid,
    },
    frame::{Frame, FrameGeometry, PyramidSource, TiffFrame, TiffPyramidSource},
};

pub struct WsiToDicomPipeline<W: ContainerWriter> {
    writer: W,
    config: ConversionConfig,
    pool: rayon::ThreadPool,
}

impl WsiToDicomPipeline<StandardDicomWriter> {
    pub fn new(config: ConversionConfig) -> Result<Self> {
        Self::with_custom(StandardDicomWriter, config)
    }
}

impl<W: ContainerWriter> WsiToDicomPipeline<W> {
    pub fn with_custom(writer: W, config: ConversionConfig) -> Result<Self> {
        config.validate()?;
        let pool = build_thread_pool(config.threads)?;
        Ok(Self {
            writer,
            config,
            pool,
        })
    }

    #[instrument(skip(self, input_path, output_dir))]
    pub fn convert_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_dir: Q,
    ) -> Result<Vec<PathBuf>> {
        let input_path = input_path.as_ref();
        let output_dir = output_dir.as_ref();

        info!(
            input = %input_path.display(),
            output = %output_dir.display(),
            "Converting file"
        );

        let source = {
            let _span = tracing::info_span!("open_source").entered();
            TiffPyramidSource::open(input_path)?
        };

        self.convert(Arc::new(source), output_dir)
    }

    /// Writes every configured level of `source` into `output_dir`.
    #[instrument(skip(self, source, output_dir))]
    pub fn convert<S: PyramidSource + 'static>(
        &self,
        source: Arc<S>,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            return Err(ConversionError::InvalidDimensions(width as usize, height as usize));
        }

        std::fs::create_dir_all(output_dir).map_err(|e| {
            ConversionError::OutputWriteError(format!("{}: {}", output_dir.display(), e))
        })?;

        let additional_tags = match &self.config.tags_file {
            Some(path) => Some(Arc::new(AdditionalTags::from_json_file(path)?)),
            None => None,
        };
        let identifiers = StudyIdentifiers {
            study_uid: uid_or_new(&self.config.study_uid),
            series_uid: uid_or_new(&self.config.series_uid),
            image_name: self.config.image_name.clone(),
        };
        let (width_mm, height_mm) = source.physical_size_mm().unwrap_or_else(|| {
            let mm_per_pixel = self.config.microns_per_pixel / 1000.0;
            (width as f64 * mm_per_pixel, height as f64 * mm_per_pixel)
        });

        let mut written = Vec::new();
        for (level, &downsample) in self.config.downsamples.iter().enumerate() {
            let layout = LevelLayout {
                output_dir: output_dir.to_path_buf(),
                image_width: div_ceil(width, u64::from(downsample)),
                image_height: div_ceil(height, u64::from(downsample)),
                level: level as u32,
                identifiers: identifiers.clone(),
                compression: self.config.compression,
                tiled: self.config.tiled_full,
                additional_tags: additional_tags.clone(),
                first_level_width_mm: width_mm,
                first_level_height_mm: height_mm,
                downsample,
            };
            let _span = tracing::info_span!(
                "write_level",
                level,
                downsample,
                width = layout.image_width,
                height = layout.image_height
            )
            .entered();
            written.extend(self.write_level(&source, layout)?);
        }

        info!(files = written.len(), "Conversion complete");
        Ok(written)
    }

    /// Splits one level into batches; each batch is scheduled on the pool and
    /// saved before the next one is scheduled.
    fn write_level<S: PyramidSource + 'static>(
        &self,
        source: &Arc<S>,
        layout: LevelLayout,
    ) -> Result<Vec<PathBuf>> {
        let frame_width = self.config.frame_width;
        let frame_height = self.config.frame_height;
        let tiles_per_row = div_ceil(layout.image_width, u64::from(frame_width));
        let tile_rows = div_ceil(layout.image_height, u64::from(frame_height));
        let total = (tiles_per_row * tile_rows) as usize;
        let batch_len = match self.config.frames_per_file {
            0 => total,
            n => n,
        }
        .max(1);

        let mut drafts: Vec<FileDraft> = Vec::new();
        let mut written = Vec::new();
        for first in (0..total).step_by(batch_len) {
            let last = (first + batch_len).min(total);
            let frames: Vec<Box<dyn Frame>> = (first..last)
                .map(|tile| {
                    let tile = tile as u64;
                    let geometry = FrameGeometry {
                        x: (tile % tiles_per_row) * u64::from(frame_width),
                        y: (tile / tiles_per_row) * u64::from(frame_height),
                        level: layout.level,
                        width: frame_width,
                        height: frame_height,
                        downsample: layout.downsample,
                    };
                    let frame = TiffFrame::new(
                        Arc::clone(source),
                        geometry,
                        self.config.compression,
                        self.config.jpeg_quality,
                    );
                    self.pool.spawn(frame.job());
                    Box::new(frame) as Box<dyn Frame>
                })
                .collect();

            let first = first as u64;
            let draft = FileDraft::new(
                frames,
                layout.clone(),
                first / tiles_per_row,
                first % tiles_per_row,
                &drafts,
            );
            written.push(draft.save_file(&self.writer)?);
            drafts.push(draft);
        }
        Ok(written)
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }
}

fn uid_or_new(uid: &str) -> String {
    if uid.is_empty() {
        generate_uid()
    } else {
        uid.to_string()
    }
}

fn build_thread_pool(threads: Option<usize>) -> Result<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("frame-worker-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| ConversionError::ConfigError(format!("failed to build thread pool: {e}")))
}
