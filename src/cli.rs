//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;
use log::warn;

use crate::params::{Dimension, DisplaySettings, ExportConfig, NoiseParameters, DEFAULT_ASSET_PATH};

/// Default PNG destination for 2D noise
pub const DEFAULT_IMAGE_PATH: &str = "worley_2d.png";

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "worley-gen")]
#[command(about = "Generate 2D or 3D Worley noise textures on the GPU", long_about = None)]
pub struct Args {
    /// Noise dimension: 2d (default) or 3d
    #[arg(long, value_name = "DIM", default_value = "2d")]
    pub dimension: String,

    /// Texture edge length in texels
    #[arg(long, value_name = "TEXELS", default_value_t = 128)]
    pub resolution: u32,

    /// Cell edge length in texels
    #[arg(long, value_name = "TEXELS", default_value_t = 32)]
    pub cell_resolution: u32,

    /// Cells per axis (one feature point per cell)
    #[arg(long, value_name = "COUNT", default_value_t = 4)]
    pub axis_cells: u32,

    /// Feature point seed
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Output path: PNG for 2D, volume asset for 3D
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Normalized depth of the 3D slice to preview
    #[arg(long, value_name = "DEPTH", default_value_t = 0.0)]
    pub slice_depth: f32,

    /// Write a PNG of the selected 3D slice here
    #[arg(long, value_name = "PATH")]
    pub preview: Option<PathBuf>,
}

impl Args {
    /// Parse the noise dimension from command-line arguments
    pub fn parse_dimension(&self) -> Dimension {
        match self.dimension.to_lowercase().as_str() {
            "2d" | "2" => Dimension::D2,
            "3d" | "3" => Dimension::D3,
            other => {
                warn!("Unknown dimension '{}', using 2d", other);
                Dimension::D2
            }
        }
    }

    pub fn noise_parameters(&self) -> NoiseParameters {
        NoiseParameters {
            dimension: self.parse_dimension(),
            texture_resolution: self.resolution,
            cell_resolution: self.cell_resolution,
            axis_cell_count: self.axis_cells,
            seed: self.seed,
        }
    }

    pub fn display_settings(&self) -> DisplaySettings {
        DisplaySettings {
            slice_depth: self.slice_depth,
        }
    }

    /// Volume export settings (used by the 3D path)
    pub fn export_config(&self) -> ExportConfig {
        ExportConfig {
            asset_path: self
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSET_PATH)),
            preview_path: self.preview.clone(),
        }
    }

    /// PNG destination (used by the 2D path)
    pub fn image_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_PATH))
    }
}
