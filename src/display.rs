//! Exposes a generated noise target to surface shaders.
//!
//! Group layout: 0 = noise texture (`_BaseMap`), 1 = its sampler,
//! 2 = `_SliceDepth` uniform used when showing one slice of a volume.

use bytemuck::{Pod, Zeroable};
use log::debug;
use wgpu::util::DeviceExt;

use crate::params::{Dimension, DisplaySettings};
use crate::target::NoiseTarget;

/// Slot name the noise texture is published under
pub const BASE_MAP_SLOT: &str = "_BaseMap";

/// Material parameter selecting the visualized 3D slice
pub const SLICE_DEPTH_PARAM: &str = "_SliceDepth";

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct DisplayUniforms {
    pub slice_depth: f32,
    pub _padding: [f32; 3], // Padding for alignment
}

/// Bind group a display material samples the noise through
pub struct DisplayBinding {
    target: NoiseTarget,
    settings: DisplaySettings,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
}

impl DisplayBinding {
    pub fn new(device: &wgpu::Device, target: &NoiseTarget, settings: DisplaySettings) -> Self {
        let dimension = target.shape().dimension;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Noise Display Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: dimension.view_dimension(),
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let uniforms = DisplayUniforms {
            slice_depth: settings.clamped_slice_depth(),
            _padding: [0.0; 3],
        };
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Noise Display Uniform Buffer"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(BASE_MAP_SLOT),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(target.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(target.sampler()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        Self {
            target: target.clone(),
            settings,
            layout,
            bind_group,
            uniform_buffer,
        }
    }

    /// Apply an edited slice depth. Only volumes have slices; for 2D targets the
    /// value is stored but not uploaded. Returns the depth actually applied.
    pub fn set_slice_depth(&mut self, queue: &wgpu::Queue, slice_depth: f32) -> f32 {
        self.settings.slice_depth = slice_depth;
        let applied = self.settings.clamped_slice_depth();

        if self.target.shape().dimension == Dimension::D3 {
            let uniforms = DisplayUniforms {
                slice_depth: applied,
                _padding: [0.0; 3],
            };
            queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
            debug!("{} = {}", SLICE_DEPTH_PARAM, applied);
        }

        applied
    }

    pub fn settings(&self) -> DisplaySettings {
        self.settings
    }

    /// Allocation currently bound
    pub fn target(&self) -> &NoiseTarget {
        &self.target
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}
