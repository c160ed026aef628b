//! Noise generation parameters.

use crate::error::{Result, WorleyError};
use crate::target::TargetShape;

/// Fixed compute workgroup edge length (threads per axis).
/// Must match `@workgroup_size` in the WGSL kernels.
pub const THREAD_GROUP_SIZE: u32 = 8;

/// Noise dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dimension {
    /// Flat 2D texture, one feature point per square cell
    #[default]
    D2,

    /// Volume texture, one feature point per cubic cell
    D3,
}

impl Dimension {
    /// Number of spatial axes (2 or 3)
    pub fn axes(self) -> u32 {
        match self {
            Dimension::D2 => 2,
            Dimension::D3 => 3,
        }
    }

    /// Matching wgpu texture dimension
    pub fn texture_dimension(self) -> wgpu::TextureDimension {
        match self {
            Dimension::D2 => wgpu::TextureDimension::D2,
            Dimension::D3 => wgpu::TextureDimension::D3,
        }
    }

    /// Matching wgpu view dimension (for storage and sampled bindings)
    pub fn view_dimension(self) -> wgpu::TextureViewDimension {
        match self {
            Dimension::D2 => wgpu::TextureViewDimension::D2,
            Dimension::D3 => wgpu::TextureViewDimension::D3,
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dimension::D2 => write!(f, "2D"),
            Dimension::D3 => write!(f, "3D"),
        }
    }
}

/// Worley noise generation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoiseParameters {
    /// 2D or 3D noise
    pub dimension: Dimension,

    /// Texture edge length in texels (width = height, and depth for 3D)
    pub texture_resolution: u32,

    /// Edge length of one cell in texels, forwarded to the kernel
    pub cell_resolution: u32,

    /// Number of cells along each axis (feature points = this ^ dimension)
    pub axis_cell_count: u32,

    /// Seed for feature point placement
    pub seed: u64,
}

impl Default for NoiseParameters {
    fn default() -> Self {
        Self {
            dimension: Dimension::D2,
            texture_resolution: 128,
            cell_resolution: 32,
            axis_cell_count: 4,
            seed: 0,
        }
    }
}

impl NoiseParameters {
    /// Reject degenerate parameters before any GPU work is issued
    pub fn validate(&self) -> Result<()> {
        if self.texture_resolution == 0 {
            return Err(WorleyError::invalid(
                "texture_resolution",
                "must be greater than zero",
            ));
        }
        if self.axis_cell_count == 0 {
            return Err(WorleyError::invalid(
                "axis_cell_count",
                "must be greater than zero",
            ));
        }
        if self.feature_buffer_size().is_none() {
            return Err(WorleyError::invalid(
                "axis_cell_count",
                format!(
                    "{}^{} feature points overflow the address space",
                    self.axis_cell_count,
                    self.dimension.axes()
                ),
            ));
        }
        Ok(())
    }

    /// [`validate`](Self::validate), then check buffer and texture sizes
    /// against what `limits` allows
    pub fn validate_for_limits(&self, limits: &wgpu::Limits) -> Result<()> {
        self.validate()?;

        let max_dimension = match self.dimension {
            Dimension::D2 => limits.max_texture_dimension_2d,
            Dimension::D3 => limits.max_texture_dimension_3d,
        };
        if self.texture_resolution > max_dimension {
            return Err(WorleyError::invalid(
                "texture_resolution",
                format!(
                    "{} exceeds the device's {} texture limit of {}",
                    self.texture_resolution, self.dimension, max_dimension
                ),
            ));
        }

        let max_binding = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        let feature_bytes = self.feature_buffer_size().unwrap_or(u64::MAX);
        if feature_bytes > max_binding {
            return Err(WorleyError::invalid(
                "axis_cell_count",
                format!(
                    "feature points need {} bytes, device allows {} per storage binding",
                    feature_bytes, max_binding
                ),
            ));
        }

        let texel_bytes = self.target_shape().padded_buffer_size();
        if texel_bytes > max_binding {
            return Err(WorleyError::invalid(
                "texture_resolution",
                format!(
                    "texel buffer needs {} bytes, device allows {} per storage binding",
                    texel_bytes, max_binding
                ),
            ));
        }
        Ok(())
    }

    /// Total feature points, or `None` if the count overflows `usize`
    pub fn feature_point_count(&self) -> Option<usize> {
        (self.axis_cell_count as usize).checked_pow(self.dimension.axes())
    }

    /// Bytes of the packed feature point upload, or `None` on overflow
    pub fn feature_buffer_size(&self) -> Option<u64> {
        let count = u64::try_from(self.feature_point_count()?).ok()?;
        count.checked_mul(self.dimension.axes() as u64 * std::mem::size_of::<f32>() as u64)
    }

    /// Shape of the texture these parameters generate into
    pub fn target_shape(&self) -> TargetShape {
        TargetShape::new(self.texture_resolution, self.dimension)
    }

    /// Workgroups launched along each axis
    pub fn groups_per_axis(&self) -> u32 {
        thread_groups(self.texture_resolution, THREAD_GROUP_SIZE)
    }

    /// Workgroup counts for the dispatch; the shape encodes dimensionality
    pub fn group_counts(&self) -> [u32; 3] {
        let n = self.groups_per_axis();
        match self.dimension {
            Dimension::D2 => [n, n, 1],
            Dimension::D3 => [n, n, n],
        }
    }
}

/// Ceiling division of a resolution into workgroups
pub fn thread_groups(resolution: u32, group_size: u32) -> u32 {
    resolution.div_ceil(group_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_groups_ceiling() {
        assert_eq!(thread_groups(128, 8), 16);
        assert_eq!(thread_groups(130, 8), 17);
        assert_eq!(thread_groups(1, 8), 1);
        assert_eq!(thread_groups(0, 8), 0);
    }

    #[test]
    fn test_group_counts_encode_dimension() {
        let mut params = NoiseParameters::default();
        assert_eq!(params.group_counts(), [16, 16, 1]);

        params.dimension = Dimension::D3;
        params.texture_resolution = 64;
        assert_eq!(params.group_counts(), [8, 8, 8]);
    }

    #[test]
    fn test_feature_point_count() {
        let mut params = NoiseParameters::default();
        assert_eq!(params.feature_point_count(), Some(16));
        assert_eq!(params.feature_buffer_size(), Some(16 * 8));

        params.dimension = Dimension::D3;
        assert_eq!(params.feature_point_count(), Some(64));
        assert_eq!(params.feature_buffer_size(), Some(64 * 12));
    }

    #[test]
    fn test_validate_rejects_overflowing_cell_counts() {
        for axis_cell_count in [3_000_000, 1 << 22] {
            let params = NoiseParameters {
                dimension: Dimension::D3,
                axis_cell_count,
                ..Default::default()
            };
            assert_eq!(params.feature_point_count(), None);
            assert!(matches!(
                params.validate(),
                Err(WorleyError::InvalidParameter {
                    name: "axis_cell_count",
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_validate_for_limits_rejects_oversized_buffers() {
        let limits = wgpu::Limits::default();

        // 300^3 points * 12 bytes is well past the default 128 MiB binding
        let dense = NoiseParameters {
            dimension: Dimension::D3,
            axis_cell_count: 300,
            ..Default::default()
        };
        assert!(dense.validate().is_ok());
        assert!(matches!(
            dense.validate_for_limits(&limits),
            Err(WorleyError::InvalidParameter {
                name: "axis_cell_count",
                ..
            })
        ));

        // 600^3 texels with rows padded to 768 bytes
        let large = NoiseParameters {
            dimension: Dimension::D3,
            texture_resolution: 600,
            ..Default::default()
        };
        assert!(matches!(
            large.validate_for_limits(&limits),
            Err(WorleyError::InvalidParameter {
                name: "texture_resolution",
                ..
            })
        ));

        let wide = NoiseParameters {
            texture_resolution: limits.max_texture_dimension_2d + 1,
            ..Default::default()
        };
        assert!(wide.validate_for_limits(&limits).is_err());

        let mut fits = NoiseParameters::default();
        assert!(fits.validate_for_limits(&limits).is_ok());
        fits.dimension = Dimension::D3;
        fits.texture_resolution = 256;
        assert!(fits.validate_for_limits(&limits).is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let params = NoiseParameters {
            texture_resolution: 0,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(WorleyError::InvalidParameter {
                name: "texture_resolution",
                ..
            })
        ));

        let params = NoiseParameters {
            axis_cell_count: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        assert!(NoiseParameters::default().validate().is_ok());
    }
}
