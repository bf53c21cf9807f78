use std::path::PathBuf;

use clap::Parser;
use wsi_dicom_rs::image_pipeline::{ConversionConfig, DicomCompression, WsiToDicomPipeline};
use wsi_dicom_rs::logger;

use tracing::{error, info};

/// Converts a whole slide TIFF into multi-frame DICOM files, one set per level.
#[derive(Debug, Parser)]
#[command(name = "wsi2dcm", version)]
struct Args {
    /// Source TIFF file
    input: PathBuf,

    /// Directory receiving the DICOM files
    output_dir: PathBuf,

    /// Pixel data encoding: raw, jpeg or jpeg2000
    #[arg(long, default_value = "jpeg")]
    compression: DicomCompression,

    /// Frame width in pixels
    #[arg(long, default_value_t = 256)]
    tile_width: u32,

    /// Frame height in pixels
    #[arg(long, default_value_t = 256)]
    tile_height: u32,

    /// Frames per file, 0 writes each level into a single file
    #[arg(long, default_value_t = 0)]
    batch: usize,

    /// Comma separated downsample factors, one output level each
    #[arg(long, value_delimiter = ',', default_value = "1")]
    downsamples: Vec<u32>,

    /// JPEG quality (1-100)
    #[arg(long, default_value_t = 80)]
    jpeg_quality: u8,

    /// Frame worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Write per-frame positions (TILED_SPARSE) instead of TILED_FULL
    #[arg(long)]
    sparse: bool,

    #[arg(long, default_value = "")]
    study_uid: String,

    #[arg(long, default_value = "")]
    series_uid: String,

    /// Series description
    #[arg(long, default_value = "")]
    image_name: String,

    /// JSON file with additional tags
    #[arg(long)]
    tags: Option<PathBuf>,

    /// Resolution used when the TIFF carries none
    #[arg(long, default_value_t = 0.25)]
    mpp: f64,
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    info!("Starting wsi2dcm...");

    let config = ConversionConfig::builder()
        .compression(args.compression)
        .frame_size(args.tile_width, args.tile_height)
        .frames_per_file(args.batch)
        .downsamples(args.downsamples)
        .jpeg_quality(args.jpeg_quality)
        .threads(args.threads)
        .tiled_full(!args.sparse)
        .study_uid(args.study_uid)
        .series_uid(args.series_uid)
        .image_name(args.image_name)
        .tags_file(args.tags)
        .microns_per_pixel(args.mpp)
        .build();
    let pipeline = WsiToDicomPipeline::new(config)?;

    info!("Compression: {:?}", pipeline.config().compression);
    info!("Levels: {:?}", pipeline.config().downsamples);

    match pipeline.convert_file(&args.input, &args.output_dir) {
        Ok(files) => info!("Conversion successful, {} files written", files.len()),
        Err(e) => {
            error!("Conversion failed: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
