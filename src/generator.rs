//! Worley noise generation entry point.
//!
//! Parameter edits are applied explicitly with [`WorleyGenerator::apply_parameters`];
//! nothing regenerates on its own. Each call to [`WorleyGenerator::generate`]
//! samples fresh feature points, reuses the target when its shape still matches,
//! dispatches the kernel and, for volumes, starts the asset export.
//!
//! Overlapping generations on one generator are ruled out by `&mut self`.

use log::info;

use crate::dispatch::{dispatch, DispatchReport};
use crate::display::DisplayBinding;
use crate::error::Result;
use crate::export::{request_export, PendingExport};
use crate::gpu::GpuContext;
use crate::kernel::WorleyKernel;
use crate::params::{Dimension, DisplaySettings, ExportConfig, NoiseParameters};
use crate::sampler::sample;
use crate::target::{ensure_target, NoiseTarget};

/// Result of one `generate` call
pub enum Generation {
    /// 2D noise is complete once the GPU drains the queue
    Flat {
        report: DispatchReport,
        target: NoiseTarget,
    },
    /// 3D noise plus its in-flight asset export
    Volume {
        report: DispatchReport,
        target: NoiseTarget,
        export: PendingExport,
    },
}

impl Generation {
    pub fn report(&self) -> &DispatchReport {
        match self {
            Generation::Flat { report, .. } | Generation::Volume { report, .. } => report,
        }
    }

    pub fn target(&self) -> &NoiseTarget {
        match self {
            Generation::Flat { target, .. } | Generation::Volume { target, .. } => target,
        }
    }
}

pub struct WorleyGenerator {
    params: NoiseParameters,
    display: DisplaySettings,
    export: ExportConfig,
    kernel_2d: Option<WorleyKernel>,
    kernel_3d: Option<WorleyKernel>,
    target: Option<NoiseTarget>,
    display_binding: Option<DisplayBinding>,
}

impl WorleyGenerator {
    pub fn new(params: NoiseParameters, display: DisplaySettings, export: ExportConfig) -> Self {
        Self {
            params,
            display,
            export,
            kernel_2d: None,
            kernel_3d: None,
            target: None,
            display_binding: None,
        }
    }

    pub fn parameters(&self) -> &NoiseParameters {
        &self.params
    }

    pub fn export_config(&self) -> &ExportConfig {
        &self.export
    }

    /// Replace the generation parameters. Invalid parameters are rejected and
    /// the previous ones kept.
    pub fn apply_parameters(&mut self, params: NoiseParameters) -> Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    /// Apply edited display settings, pushing the slice depth to a bound volume.
    /// Returns the slice depth in effect.
    pub fn apply_display_settings(&mut self, queue: &wgpu::Queue, settings: DisplaySettings) -> f32 {
        self.display = settings;
        match self
            .display_binding
            .as_mut()
            .filter(|binding| binding.target().is_allocated())
        {
            Some(binding) => binding.set_slice_depth(queue, settings.slice_depth),
            None => settings.clamped_slice_depth(),
        }
    }

    /// Target written by the last generation. `None` before the first
    /// generation and once a volume export has released the texture.
    pub fn target(&self) -> Option<&NoiseTarget> {
        self.target.as_ref().filter(|target| target.is_allocated())
    }

    /// Display binding for the current target (the `_BaseMap` slot). Follows
    /// [`target`](Self::target): a released texture is never handed out; the
    /// next [`generate`](Self::generate) binds the new allocation.
    pub fn display_binding(&self) -> Option<&DisplayBinding> {
        self.display_binding
            .as_ref()
            .filter(|binding| binding.target().is_allocated())
    }

    /// Enqueue one generation. Returns as soon as the work is submitted.
    pub fn generate(&mut self, ctx: &GpuContext) -> Result<Generation> {
        self.params.validate_for_limits(&ctx.device.limits())?;
        let params = self.params.clone();
        let dimension = params.dimension;

        let target = ensure_target(
            &ctx.device,
            self.target.take(),
            params.texture_resolution,
            dimension,
        );
        self.target = Some(target.clone());

        let points = sample(dimension, params.axis_cell_count, params.seed);
        let kernel = self.kernel(&ctx.device, dimension);
        let report = dispatch(&ctx.device, &ctx.queue, kernel, &params, &points, &target);

        let rebind = self
            .display_binding
            .as_ref()
            .map_or(true, |b| {
                !b.target().is_allocated() || b.target().allocation_id() != target.allocation_id()
            });
        if rebind {
            self.display_binding = Some(DisplayBinding::new(&ctx.device, &target, self.display));
        }

        info!(
            "Generated {} Worley noise: {} points, {}px, groups {:?}",
            dimension, report.point_count, params.texture_resolution, report.group_counts
        );

        match dimension {
            Dimension::D2 => Ok(Generation::Flat { report, target }),
            Dimension::D3 => {
                let mut export = request_export(
                    &ctx.device,
                    &ctx.queue,
                    target.clone(),
                    self.export.asset_path.clone(),
                )?;
                if let Some(preview) = &self.export.preview_path {
                    export = export.with_preview(preview.clone(), self.display.slice_depth);
                }
                Ok(Generation::Volume {
                    report,
                    target,
                    export,
                })
            }
        }
    }

    fn kernel(&mut self, device: &wgpu::Device, dimension: Dimension) -> &WorleyKernel {
        let slot = match dimension {
            Dimension::D2 => &mut self.kernel_2d,
            Dimension::D3 => &mut self.kernel_3d,
        };
        slot.get_or_insert_with(|| WorleyKernel::new(device, dimension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::VolumeTextureAsset;
    use crate::error::WorleyError;
    use crate::export::{read_target_blocking, ExportState};
    use crate::gpu::test_context;
    use std::path::PathBuf;

    fn temp_asset(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("worley_gen_generator_{}", std::process::id()))
            .join(name)
    }

    fn volume_generator(path: PathBuf) -> WorleyGenerator {
        let params = NoiseParameters {
            dimension: Dimension::D3,
            texture_resolution: 64,
            cell_resolution: 16,
            axis_cell_count: 4,
            seed: 7,
        };
        let export = ExportConfig {
            asset_path: path,
            preview_path: None,
        };
        WorleyGenerator::new(params, DisplaySettings::default(), export)
    }

    #[test]
    fn test_apply_parameters_rejects_invalid() {
        let mut generator = WorleyGenerator::new(
            NoiseParameters::default(),
            DisplaySettings::default(),
            ExportConfig::default(),
        );

        let bad = NoiseParameters {
            texture_resolution: 0,
            ..Default::default()
        };
        assert!(matches!(
            generator.apply_parameters(bad),
            Err(WorleyError::InvalidParameter { .. })
        ));
        assert_eq!(generator.parameters(), &NoiseParameters::default());

        let good = NoiseParameters {
            seed: 99,
            ..Default::default()
        };
        generator.apply_parameters(good.clone()).unwrap();
        assert_eq!(generator.parameters(), &good);
    }

    #[test]
    fn test_generate_2d_end_to_end() {
        let ctx = test_context();

        let params = NoiseParameters {
            dimension: Dimension::D2,
            texture_resolution: 128,
            cell_resolution: 32,
            axis_cell_count: 4,
            seed: 42,
        };
        let mut generator =
            WorleyGenerator::new(params, DisplaySettings::default(), ExportConfig::default());

        let generation = generator.generate(&ctx).unwrap();
        assert_eq!(generation.report().point_count, 16);
        assert_eq!(generation.report().group_counts, [16, 16, 1]);
        assert!(matches!(generation, Generation::Flat { .. }));

        let texels = read_target_blocking(&ctx.device, &ctx.queue, generation.target()).unwrap();
        assert_eq!(texels.len(), 128 * 128);
        assert!(texels.iter().any(|&t| t > 0));

        // Same shape again reuses the allocation
        let first_id = generation.target().allocation_id();
        let again = generator.generate(&ctx).unwrap();
        assert_eq!(again.target().allocation_id(), first_id);
        assert!(generator.display_binding().is_some());
    }

    #[test]
    fn test_generate_3d_persists_gpu_contents() {
        let ctx = test_context();

        let path = temp_asset("volume.asset");
        let mut generator = volume_generator(path.clone());

        let generation = generator.generate(&ctx).unwrap();
        assert_eq!(generation.report().point_count, 64);
        assert_eq!(generation.report().group_counts, [8, 8, 8]);

        let Generation::Volume { target, mut export, .. } = generation else {
            panic!("3D parameters must produce a volume generation");
        };
        assert_eq!(export.state(), ExportState::ReadbackRequested);

        let gpu_texels = read_target_blocking(&ctx.device, &ctx.queue, &target).unwrap();
        let persisted = export.wait(&ctx.device).unwrap();
        assert_eq!(
            (persisted.width, persisted.height, persisted.depth),
            (64, 64, 64)
        );
        assert!(!target.is_allocated());

        let asset = VolumeTextureAsset::load(&path).unwrap();
        assert_eq!(asset.texel_count(), 64 * 64 * 64);
        assert_eq!(asset.data().unwrap(), gpu_texels.as_slice());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_export_twice_overwrites() {
        let ctx = test_context();

        let path = temp_asset("overwrite.asset");
        let mut generator = volume_generator(path.clone());

        for seed in [1, 2] {
            let mut params = generator.parameters().clone();
            params.seed = seed;
            params.texture_resolution = 16;
            generator.apply_parameters(params).unwrap();

            let Generation::Volume { mut export, .. } = generator.generate(&ctx).unwrap() else {
                panic!("expected volume generation");
            };
            export.wait(&ctx.device).unwrap();
        }

        let entries = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("overwrite"))
            .count();
        assert_eq!(entries, 1);
        assert_eq!(VolumeTextureAsset::load(&path).unwrap().texel_count(), 16 * 16 * 16);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_export_hides_released_target_and_binding() {
        let ctx = test_context();

        let path = temp_asset("hidden.asset");
        let mut generator = volume_generator(path.clone());
        let mut params = generator.parameters().clone();
        params.texture_resolution = 8;
        generator.apply_parameters(params).unwrap();

        let Generation::Volume { mut export, .. } = generator.generate(&ctx).unwrap() else {
            panic!("expected volume generation");
        };
        let bound_id = generator.display_binding().unwrap().target().allocation_id();
        assert_eq!(generator.target().unwrap().allocation_id(), bound_id);

        export.wait(&ctx.device).unwrap();
        assert!(generator.target().is_none());
        assert!(generator.display_binding().is_none());
        // Slice edits still resolve without touching the destroyed texture
        assert_eq!(
            generator.apply_display_settings(&ctx.queue, DisplaySettings { slice_depth: 0.25 }),
            0.25
        );

        // A 2D generation rebinds to a live texture
        let mut params = generator.parameters().clone();
        params.dimension = Dimension::D2;
        generator.apply_parameters(params).unwrap();
        let generation = generator.generate(&ctx).unwrap();
        let binding = generator.display_binding().unwrap();
        assert!(binding.target().is_allocated());
        assert_eq!(
            binding.target().allocation_id(),
            generation.target().allocation_id()
        );
        assert_ne!(binding.target().allocation_id(), bound_id);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_generate_rejects_parameters_beyond_device_limits() {
        let ctx = test_context();

        let limits = ctx.device.limits();
        let params = NoiseParameters {
            dimension: Dimension::D2,
            texture_resolution: limits.max_texture_dimension_2d + 1,
            ..Default::default()
        };
        let mut generator =
            WorleyGenerator::new(params, DisplaySettings::default(), ExportConfig::default());
        assert!(matches!(
            generator.generate(&ctx),
            Err(WorleyError::InvalidParameter {
                name: "texture_resolution",
                ..
            })
        ));
        assert!(generator.target().is_none());
    }

    #[test]
    fn test_released_volume_target_is_reallocated() {
        let ctx = test_context();

        let path = temp_asset("realloc.asset");
        let mut generator = volume_generator(path.clone());
        let mut params = generator.parameters().clone();
        params.texture_resolution = 8;
        generator.apply_parameters(params).unwrap();

        let Generation::Volume { target, mut export, .. } = generator.generate(&ctx).unwrap() else {
            panic!("expected volume generation");
        };
        export.wait(&ctx.device).unwrap();

        // The export released the texture, so the next generation allocates anew
        let next = generator.generate(&ctx).unwrap();
        assert_ne!(next.target().allocation_id(), target.allocation_id());
        let Generation::Volume { mut export, .. } = next else {
            panic!("expected volume generation");
        };
        export.wait(&ctx.device).unwrap();

        std::fs::remove_file(&path).ok();
    }
}
