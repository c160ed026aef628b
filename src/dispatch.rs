//! Feature point upload and compute dispatch.
//!
//! The kernel writes unorm bytes into a zeroed storage buffer whose rows are
//! padded for copying; the same submission then copies that buffer into the
//! `R8Unorm` target. Only core storage-buffer features are used, so this runs
//! on adapters that cannot bind `R8Unorm` as a storage texture.

use log::debug;
use wgpu::util::DeviceExt;

use crate::kernel::{
    KernelParams, WorleyKernel, FEATURE_POINTS_BINDING, PARAMS_BINDING, RESULT_BINDING,
};
use crate::params::NoiseParameters;
use crate::sampler::FeaturePoints;
use crate::target::NoiseTarget;

/// What was enqueued; the GPU finishes asynchronously
#[derive(Debug)]
pub struct DispatchReport {
    pub group_counts: [u32; 3],
    pub point_count: usize,
    pub submission: wgpu::SubmissionIndex,
}

/// Upload `points`, bind everything to `kernel` and enqueue the dispatch
/// followed by the copy into `target`.
///
/// The feature point and texel buffers are owned by this call and dropped
/// after submission.
/// wgpu keeps submitted resources alive until the GPU has finished with them,
/// so the dispatch may still be running when this returns.
///
/// # Panics
/// Binding mismatches (kernel dimension vs target shape) surface as wgpu
/// validation errors, which are fatal on the default device error handler.
pub fn dispatch(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    kernel: &WorleyKernel,
    params: &NoiseParameters,
    points: &FeaturePoints,
    target: &NoiseTarget,
) -> DispatchReport {
    let kernel_params = KernelParams::from(params);
    let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Worley Params Buffer"),
        contents: bytemuck::bytes_of(&kernel_params),
        usage: wgpu::BufferUsages::UNIFORM,
    });

    // Empty storage bindings are invalid, so an empty set still gets one point's worth
    let mut floats = points.to_gpu_floats();
    if floats.is_empty() {
        floats.resize(points.dimension().axes() as usize, 0.0);
    }
    let feature_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Feature Points Buffer"),
        contents: bytemuck::cast_slice(&floats),
        usage: wgpu::BufferUsages::STORAGE,
    });
    debug!(
        "Uploaded {} feature points ({} bytes each)",
        points.len(),
        points.stride_bytes()
    );

    // Fresh buffers are zero-initialized, which the kernel's atomicOr packing relies on
    let shape = target.shape();
    let row_pitch = kernel_params.row_pitch;
    let texel_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Worley Texel Buffer"),
        size: shape.padded_buffer_size(),
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Worley Bind Group"),
        layout: kernel.bind_group_layout(),
        entries: &[
            wgpu::BindGroupEntry {
                binding: PARAMS_BINDING,
                resource: params_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: FEATURE_POINTS_BINDING,
                resource: feature_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: RESULT_BINDING,
                resource: texel_buffer.as_entire_binding(),
            },
        ],
    });

    let group_counts = params.group_counts();

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Worley Compute Encoder"),
    });

    {
        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Worley Compute Pass"),
            timestamp_writes: None,
        });

        compute_pass.set_pipeline(kernel.pipeline());
        compute_pass.set_bind_group(0, &bind_group, &[]);
        compute_pass.dispatch_workgroups(group_counts[0], group_counts[1], group_counts[2]);
    }

    encoder.copy_buffer_to_texture(
        wgpu::ImageCopyBuffer {
            buffer: &texel_buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(row_pitch),
                rows_per_image: Some(shape.resolution),
            },
        },
        wgpu::ImageCopyTexture {
            texture: target.texture(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        shape.extent(),
    );

    let submission = queue.submit(Some(encoder.finish()));
    debug!(
        "Dispatched {} Worley kernel with groups {:?}",
        kernel.dimension(),
        group_counts
    );

    // Release the per-dispatch buffers now; the queue holds its own references.
    drop(bind_group);
    drop(texel_buffer);
    drop(feature_buffer);
    drop(params_buffer);

    DispatchReport {
        group_counts,
        point_count: points.len(),
        submission,
    }
}
