//! Persisted volumetric texture asset.
//!
//! On-disk layout is a bincode-encoded [`VolumeTextureAsset`] with a magic tag
//! and format version. Writing always overwrites the destination.

use std::fs;
use std::path::Path;

use image::GrayImage;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorleyError};

const ASSET_MAGIC: [u8; 4] = *b"WRLY";
const ASSET_VERSION: u32 = 1;

/// Texel format tag stored with the asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeFormat {
    /// One unsigned normalized byte per texel
    R8Unorm,
}

/// CPU-side 3D texture, one byte per texel, x fastest then y then z
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeTextureAsset {
    magic: [u8; 4],
    version: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: VolumeFormat,
    /// Cleared once the asset is finalized; the data is then treated as GPU-only
    readable: bool,
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
}

impl VolumeTextureAsset {
    /// Wrap tightly packed texel data
    pub fn new(width: u32, height: u32, depth: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * depth as usize;
        if data.len() != expected {
            return Err(WorleyError::InvalidAsset(format!(
                "expected {} bytes for {}x{}x{}, got {}",
                expected,
                width,
                height,
                depth,
                data.len()
            )));
        }

        Ok(Self {
            magic: ASSET_MAGIC,
            version: ASSET_VERSION,
            width,
            height,
            depth,
            format: VolumeFormat::R8Unorm,
            readable: true,
            data,
        })
    }

    /// Build from a readback whose rows are padded to `padded_bytes_per_row`
    pub fn from_padded_rows(
        width: u32,
        height: u32,
        depth: u32,
        padded_bytes_per_row: u32,
        padded: &[u8],
    ) -> Result<Self> {
        let row = width as usize;
        let padded_row = padded_bytes_per_row as usize;
        let rows = height as usize * depth as usize;

        if padded_row < row || padded.len() < padded_row * rows {
            return Err(WorleyError::InvalidAsset(format!(
                "readback of {} bytes too small for {} rows of {} (padded to {})",
                padded.len(),
                rows,
                row,
                padded_row
            )));
        }

        Self::new(width, height, depth, unpad_rows(padded, row, padded_row, rows))
    }

    pub fn texel_count(&self) -> usize {
        self.data.len()
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    /// Finalize the asset; texel access is refused afterward
    pub fn make_no_longer_readable(&mut self) {
        self.readable = false;
    }

    /// Texel bytes, or `None` once the asset is no longer readable
    pub fn data(&self) -> Option<&[u8]> {
        self.readable.then_some(self.data.as_slice())
    }

    pub fn texel(&self, x: u32, y: u32, z: u32) -> Option<u8> {
        if !self.readable || x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        let index = (z as usize * self.height as usize + y as usize) * self.width as usize
            + x as usize;
        self.data.get(index).copied()
    }

    /// Grayscale image of the slice nearest to normalized `depth` in [0, 1]
    pub fn slice_image(&self, depth: f32) -> Option<GrayImage> {
        if !self.readable || self.depth == 0 {
            return None;
        }
        let z = slice_index(depth, self.depth);
        let slice_len = self.width as usize * self.height as usize;
        let start = z as usize * slice_len;
        GrayImage::from_raw(
            self.width,
            self.height,
            self.data[start..start + slice_len].to_vec(),
        )
    }

    /// Write to `path`, creating parent directories and replacing any existing file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let bytes = bincode::serialize(self)?;
        fs::write(path, bytes)?;
        info!(
            "Saved {}x{}x{} volume asset to {}",
            self.width,
            self.height,
            self.depth,
            path.display()
        );
        Ok(())
    }

    /// Read an asset back. The loaded copy is readable regardless of how it was saved.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let mut asset: Self = bincode::deserialize(&bytes)?;
        if asset.magic != ASSET_MAGIC {
            return Err(WorleyError::InvalidAsset("bad magic".to_string()));
        }
        if asset.version != ASSET_VERSION {
            return Err(WorleyError::InvalidAsset(format!(
                "unsupported version {}",
                asset.version
            )));
        }
        let expected = asset.width as usize * asset.height as usize * asset.depth as usize;
        if asset.data.len() != expected {
            return Err(WorleyError::InvalidAsset("texel count mismatch".to_string()));
        }
        asset.readable = true;
        Ok(asset)
    }
}

/// Copy `rows` rows of `row` bytes out of a buffer with `padded_row` pitch
pub(crate) fn unpad_rows(padded: &[u8], row: usize, padded_row: usize, rows: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(row * rows);
    for r in 0..rows {
        let start = r * padded_row;
        data.extend_from_slice(&padded[start..start + row]);
    }
    data
}

/// Map a normalized depth onto a slice index in `0..depth`
pub fn slice_index(depth: f32, slices: u32) -> u32 {
    if slices == 0 {
        return 0;
    }
    let d = if depth.is_nan() { 0.0 } else { depth.clamp(0.0, 1.0) };
    ((d * slices as f32) as u32).min(slices - 1)
}
