//! JSON output for scripting
//!
//! When the --json flag is enabled, every processed image and the final
//! summary are emitted as JSON lines to stdout, suppressing all other output.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::image_processing::batch::CropResult;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonMessage {
    /// Offset chosen for one image
    Crop {
        input_path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output_path: Option<String>,
        width: u32,
        height: u32,
        x: u32,
        y: u32,
        processing_time_ms: u128,
    },
    /// Image processing failed
    Failed { input_path: String, error: String },
    /// Processing summary
    Summary {
        total_files: usize,
        processed: usize,
        failed: usize,
        duration_secs: f64,
    },
}

impl JsonMessage {
    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn crop(result: &CropResult) -> Self {
        Self::Crop {
            input_path: result.input_path.display().to_string(),
            output_path: result
                .output_path
                .as_ref()
                .map(|p| p.display().to_string()),
            width: result.width,
            height: result.height,
            x: result.offset.x,
            y: result.offset.y,
            processing_time_ms: result.duration.as_millis(),
        }
    }

    pub fn failed(input_path: &Path, error: impl Into<String>) -> Self {
        Self::Failed {
            input_path: input_path.display().to_string(),
            error: error.into(),
        }
    }

    pub fn summary(total_files: usize, processed: usize, failed: usize, duration_secs: f64) -> Self {
        Self::Summary {
            total_files,
            processed,
            failed,
            duration_secs,
        }
    }
}
