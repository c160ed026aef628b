//! Compute kernels that evaluate Worley noise into a packed texel buffer.
//!
//! Binding slots (group 0):
//! - 0: `_Resolution`, `_CellResolution`, `_AxisCellCount` uniform block, plus
//!   the row pitch of the texel buffer
//! - 1: `_FeaturePoints` read-only storage buffer of packed floats
//! - 2: `_Result` read-write storage buffer, one unorm byte per texel laid out
//!   exactly as a buffer-to-texture copy into an `R8Unorm` target expects

use bytemuck::{Pod, Zeroable};

use crate::params::{Dimension, NoiseParameters};
use crate::target::padded_bytes_per_row;

pub const PARAMS_BINDING: u32 = 0;
pub const FEATURE_POINTS_BINDING: u32 = 1;
pub const RESULT_BINDING: u32 = 2;

/// Scalar parameters uploaded to the kernel's uniform block
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct KernelParams {
    pub resolution: u32,
    pub cell_resolution: u32,
    pub axis_cell_count: u32,
    /// Bytes per texel-buffer row, a multiple of `COPY_BYTES_PER_ROW_ALIGNMENT`
    pub row_pitch: u32,
}

impl From<&NoiseParameters> for KernelParams {
    fn from(params: &NoiseParameters) -> Self {
        Self {
            resolution: params.texture_resolution,
            cell_resolution: params.cell_resolution,
            axis_cell_count: params.axis_cell_count,
            row_pitch: padded_bytes_per_row(params.texture_resolution),
        }
    }
}

/// Compiled compute pipeline for one noise dimension
pub struct WorleyKernel {
    dimension: Dimension,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl WorleyKernel {
    pub fn new(device: &wgpu::Device, dimension: Dimension) -> Self {
        let (label, source) = match dimension {
            Dimension::D2 => ("Worley 2D Compute Shader", include_str!("shaders/worley_2d.wgsl")),
            Dimension::D3 => ("Worley 3D Compute Shader", include_str!("shaders/worley_3d.wgsl")),
        };

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Worley Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: PARAMS_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: FEATURE_POINTS_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: RESULT_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Worley Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Worley Compute Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            dimension,
            pipeline,
            bind_group_layout,
        }
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn pipeline(&self) -> &wgpu::ComputePipeline {
        &self.pipeline
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_params_layout() {
        assert_eq!(std::mem::size_of::<KernelParams>(), 16);

        let params = NoiseParameters::default();
        let uniforms = KernelParams::from(&params);
        assert_eq!(uniforms.resolution, 128);
        assert_eq!(uniforms.cell_resolution, 32);
        assert_eq!(uniforms.axis_cell_count, 4);
        assert_eq!(uniforms.row_pitch, 256);

        let wide = NoiseParameters {
            texture_resolution: 300,
            ..Default::default()
        };
        assert_eq!(KernelParams::from(&wide).row_pitch, 512);
    }
}
