//! GPU texture targets written by the noise kernel.
//!
//! A target is reused across generations while its shape matches the request,
//! so repeated generations at one resolution do not churn GPU allocations.
//!
//! `R8Unorm` is not a storage format on every adapter, so the kernel never binds
//! the texture for writing. It packs texels into a buffer laid out with
//! [`padded_bytes_per_row`] and the dispatch copies that buffer into the target.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;

use crate::params::Dimension;

/// Single 8-bit unsigned normalized channel
pub const NOISE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Bytes per texel of [`NOISE_FORMAT`]
pub const BYTES_PER_TEXEL: u32 = 1;

/// Row pitch shared by buffer<->texture copies of a target
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_TEXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

static NEXT_ALLOCATION_ID: AtomicU64 = AtomicU64::new(1);

/// Shape that identifies a target: edge length and dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetShape {
    pub resolution: u32,
    pub dimension: Dimension,
}

impl TargetShape {
    pub fn new(resolution: u32, dimension: Dimension) -> Self {
        Self {
            resolution,
            dimension,
        }
    }

    /// Texture extent (depth is 1 for 2D)
    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.resolution,
            height: self.resolution,
            depth_or_array_layers: self.depth(),
        }
    }

    pub fn depth(&self) -> u32 {
        match self.dimension {
            Dimension::D2 => 1,
            Dimension::D3 => self.resolution,
        }
    }

    pub fn texel_count(&self) -> usize {
        self.resolution as usize * self.resolution as usize * self.depth() as usize
    }

    /// Bytes of a copy buffer holding every texel with padded rows
    pub fn padded_buffer_size(&self) -> u64 {
        padded_bytes_per_row(self.resolution) as u64 * self.resolution as u64 * self.depth() as u64
    }

    /// Whether a target of shape `current` must be replaced to satisfy `self`
    pub fn needs_realloc(&self, current: Option<&TargetShape>) -> bool {
        match current {
            None => true,
            Some(current) => {
                current.resolution != self.resolution || current.dimension != self.dimension
            }
        }
    }
}

struct TargetInner {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    shape: TargetShape,
    allocation_id: u64,
    released: AtomicBool,
}

/// Shared handle to a noise texture.
///
/// Clones refer to the same allocation. Once [`NoiseTarget::release`] is
/// called the texture is destroyed for every holder.
#[derive(Clone)]
pub struct NoiseTarget {
    inner: Arc<TargetInner>,
}

impl std::fmt::Debug for NoiseTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseTarget")
            .field("shape", &self.inner.shape)
            .field("allocation_id", &self.inner.allocation_id)
            .field("allocated", &self.is_allocated())
            .finish()
    }
}

impl NoiseTarget {
    /// Allocate a new texture with repeat wrapping and bilinear filtering
    pub fn create(device: &wgpu::Device, shape: TargetShape) -> Self {
        let label = match shape.dimension {
            Dimension::D2 => "Worley 2D Noise Map",
            Dimension::D3 => "Worley 3D Noise Map",
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: shape.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: shape.dimension.texture_dimension(),
            format: NOISE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(shape.dimension.view_dimension()),
            ..Default::default()
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Worley Noise Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let allocation_id = NEXT_ALLOCATION_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Allocated {} noise target #{} ({}^{})",
            shape.dimension,
            allocation_id,
            shape.resolution,
            shape.dimension.axes()
        );

        Self {
            inner: Arc::new(TargetInner {
                texture,
                view,
                sampler,
                shape,
                allocation_id,
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.inner.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.inner.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.inner.sampler
    }

    pub fn shape(&self) -> TargetShape {
        self.inner.shape
    }

    /// Unique per GPU allocation; equal ids mean the same texture
    pub fn allocation_id(&self) -> u64 {
        self.inner.allocation_id
    }

    pub fn is_allocated(&self) -> bool {
        !self.inner.released.load(Ordering::Acquire)
    }

    /// Destroy the GPU texture. Idempotent.
    pub fn release(&self) {
        if !self.inner.released.swap(true, Ordering::AcqRel) {
            debug!("Released noise target #{}", self.inner.allocation_id);
            self.inner.texture.destroy();
        }
    }
}

/// Return `existing` when it still matches, otherwise release it and allocate anew.
///
/// Callers must not keep using a previously held handle after it has been
/// replaced; its texture is destroyed.
pub fn ensure_target(
    device: &wgpu::Device,
    existing: Option<NoiseTarget>,
    resolution: u32,
    dimension: Dimension,
) -> NoiseTarget {
    let requested = TargetShape::new(resolution, dimension);

    if let Some(target) = existing {
        if target.is_allocated() && !requested.needs_realloc(Some(&target.shape())) {
            return target;
        }
        target.release();
    }

    NoiseTarget::create(device, requested)
}
