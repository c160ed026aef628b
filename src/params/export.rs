//! Volume asset export and display configuration.

use std::path::PathBuf;

/// Default location for the persisted 3D noise asset
pub const DEFAULT_ASSET_PATH: &str = "Assets/Textures/3DWorley.asset";

/// 3D asset export configuration
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Destination of the volume asset (always overwritten)
    pub asset_path: PathBuf,

    /// Optional PNG of one slice, written alongside the asset
    pub preview_path: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            asset_path: PathBuf::from(DEFAULT_ASSET_PATH),
            preview_path: None,
        }
    }
}

/// Display material settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySettings {
    /// Normalized depth of the visualized 3D slice, in [0, 1]
    pub slice_depth: f32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self { slice_depth: 0.0 }
    }
}

impl DisplaySettings {
    /// Slice depth clamped to the unit range
    pub fn clamped_slice_depth(&self) -> f32 {
        if self.slice_depth.is_nan() {
            0.0
        } else {
            self.slice_depth.clamp(0.0, 1.0)
        }
    }
}
