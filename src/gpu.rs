//! Headless wgpu device acquisition.

use log::{debug, info};

use crate::error::{Result, WorleyError};

/// Device and queue used for noise generation (no surface required)
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Create a headless context on any adapter that can run compute shaders.
    ///
    /// The device is requested with the adapter's own limits so downlevel
    /// backends (GL, software rasterizers) are accepted; parameter validation
    /// checks buffer and texture sizes against [`wgpu::Device::limits`].
    pub async fn new_headless() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(WorleyError::AdapterNotFound)?;

        let info = adapter.get_info();
        info!("Using adapter: {} ({:?})", info.name, info.backend);

        let downlevel = adapter.get_downlevel_capabilities();
        if !downlevel
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            return Err(WorleyError::UnsupportedAdapter(format!(
                "{} ({:?}) cannot run compute shaders",
                info.name, info.backend
            )));
        }

        let limits = adapter.limits();
        debug!(
            "Adapter limits: storage binding {} bytes, 2D {} / 3D {} texels",
            limits.max_storage_buffer_binding_size,
            limits.max_texture_dimension_2d,
            limits.max_texture_dimension_3d
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Worley Noise Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }

    /// Blocking variant of [`GpuContext::new_headless`]
    pub fn new_headless_blocking() -> Result<Self> {
        pollster::block_on(Self::new_headless())
    }
}

/// Context for GPU-backed tests. Software adapters such as llvmpipe are enough;
/// a machine with no adapter at all fails the test rather than skipping it.
#[cfg(test)]
pub(crate) fn test_context() -> GpuContext {
    GpuContext::new_headless_blocking()
        .unwrap_or_else(|e| panic!("GPU tests need a wgpu adapter: {}", e))
}
