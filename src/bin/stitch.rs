//! stitch: combine two overlapping photographs into a panorama.

use clap::{Parser, ValueEnum};
use cv_stitch::{init_thread_pool, BlendPolicy, StitchConfig, Stitcher};
use std::path::PathBuf;
use tracing::info;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BlendMode {
    Uniform,
    Gradient,
}

#[derive(Debug, Parser)]
#[command(name = "stitch")]
#[command(about = "Stitch two overlapping images into one panorama")]
#[command(version)]
struct Cli {
    /// Image warped onto the other one's frame.
    #[arg(long)]
    left: PathBuf,

    /// Reference image; kept unwarped.
    #[arg(long)]
    right: PathBuf,

    /// Output path; the format follows the extension.
    #[arg(long)]
    out: PathBuf,

    /// Lowe ratio-test threshold.
    #[arg(long, default_value = "0.75")]
    ratio: f32,

    /// Canvas border added on every side, in pixels.
    #[arg(long, default_value = "10")]
    margin: u32,

    #[arg(long, value_enum, default_value = "uniform")]
    blend: BlendMode,

    /// Weight of the warped image for uniform blending.
    #[arg(long, default_value = "0.5")]
    alpha: f32,

    /// Gradient band width in pixels (default: whole overlap).
    #[arg(long)]
    band_width: Option<u32>,

    /// Skip exposure matching in the overlap.
    #[arg(long)]
    no_exposure: bool,

    /// Keep the black canvas border.
    #[arg(long)]
    no_crop: bool,

    /// RANSAC reprojection threshold in pixels.
    #[arg(long, default_value = "5.0")]
    ransac_threshold: f64,

    /// Seed for the descriptor pattern and RANSAC sampling.
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads (default: RUSTCV_CPU_THREADS or all cores).
    #[arg(long)]
    threads: Option<usize>,
}

fn build_config(cli: &Cli) -> StitchConfig {
    let blend = match cli.blend {
        BlendMode::Uniform => BlendPolicy::Uniform { alpha: cli.alpha },
        BlendMode::Gradient => BlendPolicy::Gradient {
            band_width: cli.band_width,
        },
    };
    let base = StitchConfig::default();
    let seed = cli.seed.or(base.seed);
    base.with_ratio_test(cli.ratio)
        .with_canvas_margin(cli.margin)
        .with_blend(blend)
        .with_exposure_correction(!cli.no_exposure)
        .with_crop_borders(!cli.no_crop)
        .with_ransac_threshold(cli.ransac_threshold)
        .with_seed(seed)
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let threads = init_thread_pool(cli.threads)?;

    let left = image::open(&cli.left)?.to_rgb8();
    let right = image::open(&cli.right)?.to_rgb8();
    info!(
        left = %cli.left.display(),
        right = %cli.right.display(),
        threads,
        "loaded inputs"
    );

    let stitcher = Stitcher::new(build_config(&cli))?;
    let (panorama, report) = stitcher.stitch_with_report(&left, &right)?;
    panorama.save(&cli.out)?;

    info!(
        out = %cli.out.display(),
        width = report.output_width,
        height = report.output_height,
        inliers = report.inliers,
        "wrote panorama"
    );
    Ok(())
}
