//! Parameter definitions with documented units and defaults.

mod export;
mod noise;

// Re-export all types
pub use export::{DisplaySettings, ExportConfig, DEFAULT_ASSET_PATH};
pub use noise::{thread_groups, Dimension, NoiseParameters, THREAD_GROUP_SIZE};
