// Library exports for reuse by the command-line tool and other applications
pub mod cli;
pub mod config_file;
pub mod image_processing;
pub mod json_output;
pub mod utils;

// Re-export commonly used types
pub use cli::{Args, FilterArg, StrategyArg};
pub use image_processing::backend::ResizeFilter;
pub use image_processing::batch::{BatchConfig, CropResult, ProcessingEngine};
pub use image_processing::geometry::{CropOffset, Rectangle, SafeZone};
pub use image_processing::{
    CascadeSet, CropConfig, CropContext, CropStrategy, Cropper, StrategyKind,
};
pub use json_output::JsonMessage;
