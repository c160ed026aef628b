//! worley-gen - GPU Worley noise texture generator
//!
//! 2D noise is read back and written as a grayscale PNG. 3D noise is exported
//! asynchronously to a volume asset, optionally with a PNG of one slice.

use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use image::GrayImage;
use log::{error, info};

use worley_gen::cli::Args;
use worley_gen::export::read_target_blocking;
use worley_gen::gpu::GpuContext;
use worley_gen::{Generation, WorleyError, WorleyGenerator};

fn run(args: &Args) -> Result<(), WorleyError> {
    let params = args.noise_parameters();
    params.validate()?;

    info!("Worley Noise Generator");
    info!("  Dimension: {}", params.dimension);
    info!("  Resolution: {}", params.texture_resolution);
    info!("  Cell resolution: {}", params.cell_resolution);
    info!("  Cells per axis: {}", params.axis_cell_count);
    info!("  Seed: {}", params.seed);

    let start = Instant::now();
    let ctx = GpuContext::new_headless_blocking()?;
    let mut generator =
        WorleyGenerator::new(params, args.display_settings(), args.export_config());

    match generator.generate(&ctx)? {
        Generation::Flat { target, .. } => {
            let resolution = target.shape().resolution;
            let texels = read_target_blocking(&ctx.device, &ctx.queue, &target)?;
            let image = GrayImage::from_raw(resolution, resolution, texels).ok_or_else(|| {
                WorleyError::InvalidAsset("readback size does not match texture".to_string())
            })?;
            let path = args.image_path();
            image.save(&path)?;
            info!("  Output: {}", path.display());
        }
        Generation::Volume { mut export, .. } => {
            // Completion arrives through the map callback; keep polling until it lands
            let persisted = loop {
                if let Some(persisted) = export.poll(&ctx.device)? {
                    break persisted;
                }
                std::thread::sleep(Duration::from_millis(1));
            };
            info!(
                "  Output: {} ({}x{}x{})",
                persisted.path.display(),
                persisted.width,
                persisted.height,
                persisted.depth
            );
        }
    }

    info!("  Time: {:.2}ms", start.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
