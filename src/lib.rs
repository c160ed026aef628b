//! Worley noise texture generation on the GPU
//!
//! Seeded feature points feed a compute kernel that writes a single-channel
//! 2D or 3D texture; volumes are read back asynchronously and persisted.

pub mod asset;
pub mod cli;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod export;
pub mod generator;
pub mod gpu;
pub mod kernel;
pub mod params;
pub mod sampler;
pub mod target;

pub use error::{Result, WorleyError};
pub use generator::{Generation, WorleyGenerator};
pub use params::{Dimension, DisplaySettings, ExportConfig, NoiseParameters};
