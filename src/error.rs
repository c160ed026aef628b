//! Error type shared by the generation pipeline.

use thiserror::Error;

use crate::export::ExportState;

pub type Result<T> = std::result::Result<T, WorleyError>;

#[derive(Error, Debug)]
pub enum WorleyError {
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Failed to find a suitable GPU adapter")]
    AdapterNotFound,

    #[error("Failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("Unsupported GPU adapter: {0}")]
    UnsupportedAdapter(String),

    #[error("GPU readback failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    #[error("GPU readback was abandoned before completion")]
    ReadbackAbandoned,

    #[error("Illegal export transition from {from:?} to {to:?}")]
    InvalidTransition { from: ExportState, to: ExportState },

    #[error("Asset I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode volume asset: {0}")]
    Encode(#[from] bincode::Error),

    #[error("Invalid volume asset: {0}")]
    InvalidAsset(String),

    #[error("Failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

impl WorleyError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
