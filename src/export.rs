//! Asynchronous readback of a 3D noise target into a persisted volume asset.
//!
//! ```text
//! Idle -> ReadbackRequested -> ReadbackComplete -> AssetPersisted
//! ```
//!
//! The map callback fires once, on whichever thread polls the device. Dropping
//! a [`PendingExport`] abandons the readback silently: no asset is written and
//! the target is left as it was. A failed asset write leaves the export in
//! `ReadbackComplete` and can be retried.

use std::path::{Path, PathBuf};

use futures::channel::oneshot;
use log::{debug, info, warn};

use crate::asset::{unpad_rows, VolumeTextureAsset};
use crate::error::{Result, WorleyError};
use crate::params::Dimension;
use crate::target::{padded_bytes_per_row, NoiseTarget, TargetShape, BYTES_PER_TEXEL};

/// Export progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    ReadbackRequested,
    ReadbackComplete,
    AssetPersisted,
}

impl ExportState {
    /// Move to `next`, which must be the immediate successor of `self`
    pub fn advance(self, next: ExportState) -> Result<ExportState> {
        let legal = matches!(
            (self, next),
            (ExportState::Idle, ExportState::ReadbackRequested)
                | (ExportState::ReadbackRequested, ExportState::ReadbackComplete)
                | (ExportState::ReadbackComplete, ExportState::AssetPersisted)
        );
        if legal {
            Ok(next)
        } else {
            Err(WorleyError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ExportState::AssetPersisted
    }
}

/// Copy all of `target` into a fresh map-readable buffer and submit.
/// Returns the buffer and its row pitch.
fn encode_readback(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    target: &NoiseTarget,
) -> (wgpu::Buffer, u32) {
    let shape = target.shape();
    let extent = shape.extent();
    let padded_bytes_per_row = padded_bytes_per_row(extent.width);

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Noise Readback Buffer"),
        size: shape.padded_buffer_size(),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Noise Readback Encoder"),
    });

    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture: target.texture(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(extent.height),
            },
        },
        extent,
    );

    queue.submit(std::iter::once(encoder.finish()));

    (staging, padded_bytes_per_row)
}

/// Synchronously read back a 2D or 3D target as tightly packed texels.
///
/// Stalls until the GPU has finished all previously submitted work.
pub fn read_target_blocking(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    target: &NoiseTarget,
) -> Result<Vec<u8>> {
    let (staging, padded_bytes_per_row) = encode_readback(device, queue, target);

    let buffer_slice = staging.slice(..);
    let (sender, receiver) = oneshot::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    device.poll(wgpu::Maintain::Wait);
    pollster::block_on(receiver).map_err(|_| WorleyError::ReadbackAbandoned)??;

    let extent = target.shape().extent();
    let texels = {
        let mapped = buffer_slice.get_mapped_range();
        unpad_rows(
            &mapped,
            (extent.width * BYTES_PER_TEXEL) as usize,
            padded_bytes_per_row as usize,
            extent.height as usize * extent.depth_or_array_layers as usize,
        )
    };
    staging.unmap();

    Ok(texels)
}

/// Summary of a finished export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedAsset {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// In-flight readback of one 3D target
pub struct PendingExport {
    state: ExportState,
    receiver: oneshot::Receiver<std::result::Result<(), wgpu::BufferAsyncError>>,
    staging: Option<wgpu::Buffer>,
    target: NoiseTarget,
    shape: TargetShape,
    padded_bytes_per_row: u32,
    path: PathBuf,
    preview: Option<(PathBuf, f32)>,
}

/// Enqueue a copy of the whole 3D `target` into CPU-visible memory.
///
/// Returns immediately; drive completion with [`PendingExport::poll`] or
/// [`PendingExport::wait`].
pub fn request_export(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    target: NoiseTarget,
    path: impl Into<PathBuf>,
) -> Result<PendingExport> {
    let shape = target.shape();
    if shape.dimension != Dimension::D3 {
        return Err(WorleyError::invalid(
            "target",
            "only 3D targets can be exported as volume assets",
        ));
    }
    if !target.is_allocated() {
        return Err(WorleyError::invalid("target", "target has been released"));
    }

    let state = ExportState::Idle;
    let (staging, padded_bytes_per_row) = encode_readback(device, queue, &target);

    let (sender, receiver) = oneshot::channel();
    staging.slice(..).map_async(wgpu::MapMode::Read, move |result| {
        // The receiver is gone if the export was abandoned
        let _ = sender.send(result);
    });

    let state = state.advance(ExportState::ReadbackRequested)?;
    debug!(
        "Requested readback of {}^3 volume ({} bytes staged)",
        shape.resolution,
        staging.size()
    );

    Ok(PendingExport {
        state,
        receiver,
        staging: Some(staging),
        target,
        shape,
        padded_bytes_per_row,
        path: path.into(),
        preview: None,
    })
}

impl PendingExport {
    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Also write a PNG of the slice at normalized `slice_depth` on completion
    pub fn with_preview(mut self, path: impl Into<PathBuf>, slice_depth: f32) -> Self {
        self.preview = Some((path.into(), slice_depth));
        self
    }

    /// Non-blocking: returns the persisted asset once the readback has landed.
    ///
    /// If writing the preview or the asset fails, the error is returned and the
    /// export stays in `ReadbackComplete` with the readback still mapped; call
    /// `poll` or [`wait`](Self::wait) again to retry the write.
    pub fn poll(&mut self, device: &wgpu::Device) -> Result<Option<PersistedAsset>> {
        match self.state {
            ExportState::ReadbackRequested => {
                device.poll(wgpu::Maintain::Poll);
                match self.receiver.try_recv() {
                    Ok(Some(result)) => {
                        self.complete_readback(result)?;
                        self.persist().map(Some)
                    }
                    Ok(None) => Ok(None),
                    Err(oneshot::Canceled) => Err(WorleyError::ReadbackAbandoned),
                }
            }
            ExportState::ReadbackComplete => self.persist().map(Some),
            state => Err(WorleyError::InvalidTransition {
                from: state,
                to: ExportState::ReadbackComplete,
            }),
        }
    }

    /// Block until the readback lands, then persist. Retryable like [`poll`](Self::poll).
    pub fn wait(&mut self, device: &wgpu::Device) -> Result<PersistedAsset> {
        match self.state {
            ExportState::ReadbackRequested => {
                device.poll(wgpu::Maintain::Wait);
                let result = pollster::block_on(&mut self.receiver)
                    .map_err(|_| WorleyError::ReadbackAbandoned)?;
                self.complete_readback(result)?;
                self.persist()
            }
            ExportState::ReadbackComplete => self.persist(),
            state => Err(WorleyError::InvalidTransition {
                from: state,
                to: ExportState::ReadbackComplete,
            }),
        }
    }

    fn complete_readback(
        &mut self,
        result: std::result::Result<(), wgpu::BufferAsyncError>,
    ) -> Result<()> {
        result?;
        self.state = self.state.advance(ExportState::ReadbackComplete)?;
        Ok(())
    }

    /// Write the preview and asset from the mapped readback. The staging buffer
    /// is unmapped and the target released only after the asset is on disk.
    fn persist(&mut self) -> Result<PersistedAsset> {
        let staging = self.staging.as_ref().ok_or(WorleyError::ReadbackAbandoned)?;
        let extent = self.shape.extent();
        let mut asset = {
            let mapped = staging.slice(..).get_mapped_range();
            VolumeTextureAsset::from_padded_rows(
                extent.width,
                extent.height,
                extent.depth_or_array_layers,
                self.padded_bytes_per_row,
                &mapped,
            )?
        };

        if let Some((preview_path, slice_depth)) = &self.preview {
            match asset.slice_image(*slice_depth) {
                Some(image) => {
                    image.save(preview_path)?;
                    info!("Saved slice preview to {}", preview_path.display());
                }
                None => warn!("Volume asset has no slices to preview"),
            }
        }

        asset.make_no_longer_readable();
        asset.save(&self.path)?;
        self.state = self.state.advance(ExportState::AssetPersisted)?;

        if let Some(staging) = self.staging.take() {
            staging.unmap();
        }
        self.target.release();

        Ok(PersistedAsset {
            path: self.path.clone(),
            width: extent.width,
            height: extent.height,
            depth: extent.depth_or_array_layers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::test_context;
    use crate::target::ensure_target;

    #[test]
    fn test_state_machine_order() {
        let state = ExportState::Idle;
        let state = state.advance(ExportState::ReadbackRequested).unwrap();
        let state = state.advance(ExportState::ReadbackComplete).unwrap();
        let state = state.advance(ExportState::AssetPersisted).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn test_state_machine_rejects_skips_and_restarts() {
        assert!(ExportState::Idle
            .advance(ExportState::AssetPersisted)
            .is_err());
        assert!(ExportState::ReadbackRequested
            .advance(ExportState::Idle)
            .is_err());
        assert!(ExportState::AssetPersisted
            .advance(ExportState::ReadbackRequested)
            .is_err());
    }

    #[test]
    fn test_export_rejects_2d_target() {
        let ctx = test_context();

        let target = ensure_target(&ctx.device, None, 16, Dimension::D2);
        let result = request_export(&ctx.device, &ctx.queue, target, "unused.asset");
        assert!(matches!(result, Err(WorleyError::InvalidParameter { .. })));
    }

    #[test]
    fn test_failed_write_can_be_retried() {
        let ctx = test_context();

        let dir = std::env::temp_dir()
            .join(format!("worley_gen_export_retry_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        // A plain file where the asset's parent directory should be
        let blocker = dir.join("blocked");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let path = blocker.join("volume.asset");

        let target = ensure_target(&ctx.device, None, 8, Dimension::D3);
        let keep = target.clone();
        let mut pending = request_export(&ctx.device, &ctx.queue, target, &path).unwrap();

        assert!(matches!(pending.wait(&ctx.device), Err(WorleyError::Io(_))));
        assert_eq!(pending.state(), ExportState::ReadbackComplete);
        assert!(keep.is_allocated());
        assert!(matches!(pending.poll(&ctx.device), Err(WorleyError::Io(_))));

        std::fs::remove_file(&blocker).unwrap();
        let persisted = pending.poll(&ctx.device).unwrap().unwrap();
        assert_eq!(persisted.path, path);
        assert_eq!(pending.state(), ExportState::AssetPersisted);
        assert!(!keep.is_allocated());
        assert_eq!(VolumeTextureAsset::load(&path).unwrap().texel_count(), 8 * 8 * 8);

        // Terminal: nothing left to complete
        assert!(matches!(
            pending.wait(&ctx.device),
            Err(WorleyError::InvalidTransition { .. })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_dropped_export_writes_nothing() {
        let ctx = test_context();

        let path = std::env::temp_dir()
            .join(format!("worley_gen_export_{}", std::process::id()))
            .join("abandoned.asset");
        let target = ensure_target(&ctx.device, None, 8, Dimension::D3);
        let keep = target.clone();

        let pending = request_export(&ctx.device, &ctx.queue, target, &path).unwrap();
        assert_eq!(pending.state(), ExportState::ReadbackRequested);
        drop(pending);
        ctx.device.poll(wgpu::Maintain::Wait);

        assert!(!path.exists());
        assert!(keep.is_allocated());
    }
}
