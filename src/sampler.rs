//! Seeded feature point sampling.
//!
//! One random point per grid cell, in cell-local unit coordinates. The kernel
//! offsets each point by its cell index, so the sampler only decides where
//! inside the cell the point lands.

use glam::{Vec2, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::params::Dimension;

/// Feature points for one dispatch, tagged by dimension
#[derive(Debug, Clone, PartialEq)]
pub enum FeaturePoints {
    D2(Vec<Vec2>),
    D3(Vec<Vec3>),
}

impl FeaturePoints {
    pub fn dimension(&self) -> Dimension {
        match self {
            FeaturePoints::D2(_) => Dimension::D2,
            FeaturePoints::D3(_) => Dimension::D3,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FeaturePoints::D2(points) => points.len(),
            FeaturePoints::D3(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes per point in the GPU buffer (2 or 3 tightly packed floats)
    pub fn stride_bytes(&self) -> usize {
        self.dimension().axes() as usize * std::mem::size_of::<f32>()
    }

    /// Flatten into the tightly packed float layout read by the kernel
    pub fn to_gpu_floats(&self) -> Vec<f32> {
        match self {
            FeaturePoints::D2(points) => points.iter().flat_map(|p| p.to_array()).collect(),
            FeaturePoints::D3(points) => points.iter().flat_map(|p| p.to_array()).collect(),
        }
    }
}

/// Generate `axis_cell_count ^ dimension` points in row-major cell order.
///
/// The generator is reseeded on every call, so identical arguments always
/// reproduce the same set. Zero cells yields an empty set.
///
/// # Panics
/// If `axis_cell_count ^ dimension` overflows `usize`.
/// [`NoiseParameters::validate`](crate::params::NoiseParameters::validate)
/// rejects such counts.
pub fn sample(dimension: Dimension, axis_cell_count: u32, seed: u64) -> FeaturePoints {
    let mut rng = StdRng::seed_from_u64(seed);
    let count = (axis_cell_count as usize)
        .checked_pow(dimension.axes())
        .unwrap_or_else(|| {
            panic!(
                "{}^{} feature points overflow usize",
                axis_cell_count,
                dimension.axes()
            )
        });

    match dimension {
        Dimension::D2 => FeaturePoints::D2(
            (0..count)
                .map(|_| Vec2::new(rng.gen::<f32>(), rng.gen::<f32>()))
                .collect(),
        ),
        Dimension::D3 => FeaturePoints::D3(
            (0..count)
                .map(|_| Vec3::new(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>()))
                .collect(),
        ),
    }
}
