//! Boosted cascade of weighted-rectangle features
//!
//! Cascades are converted offline from the usual XML description and stored
//! as JSON:
//!
//! ```json
//! { "size": [24, 24],
//!   "stages": [ { "threshold": -1.2,
//!                 "features": [ { "threshold": 0.5, "left_val": 1.0, "right_val": -1.0,
//!                                 "rectangles": [[6, 4, 12, 9, -1.0], [6, 7, 12, 3, 3.0]] } ] } ] }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::geometry::Rectangle;
use super::integral::IntegralTables;

/// Rectangle of a feature, in detector-window coordinates, with its weight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 5]", into = "[f64; 5]")]
pub struct WeightedRectangle {
    pub rect: Rectangle,
    pub weight: f64,
}

impl From<[f64; 5]> for WeightedRectangle {
    fn from(values: [f64; 5]) -> Self {
        Self {
            rect: Rectangle::new(
                values[0].max(0.0) as u32,
                values[1].max(0.0) as u32,
                values[2].max(0.0) as u32,
                values[3].max(0.0) as u32,
            ),
            weight: values[4],
        }
    }
}

impl From<WeightedRectangle> for [f64; 5] {
    fn from(weighted: WeightedRectangle) -> Self {
        [
            weighted.rect.x as f64,
            weighted.rect.y as f64,
            weighted.rect.width as f64,
            weighted.rect.height as f64,
            weighted.weight,
        ]
    }
}

/// Weak classifier: one stump over a weighted rectangle sum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub threshold: f64,
    #[serde(rename = "left_val")]
    pub left_value: f64,
    #[serde(rename = "right_val")]
    pub right_value: f64,
    pub rectangles: Vec<WeightedRectangle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub threshold: f64,
    pub features: Vec<Feature>,
}

/// A loaded cascade; read-only once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cascade {
    /// Detector window size `(width, height)` at scale 1.0
    pub size: (u32, u32),
    pub stages: Vec<Stage>,
}

impl Cascade {
    /// Load and validate a JSON cascade file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read cascade file: {}", path.display()))?;

        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse cascade file: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let cascade: Cascade = serde_json::from_str(json).context("Malformed cascade data")?;
        cascade.validate()?;
        Ok(cascade)
    }

    /// Reject cascades that could never produce a meaningful window
    pub fn validate(&self) -> Result<()> {
        if self.size.0 == 0 || self.size.1 == 0 {
            return Err(anyhow::anyhow!(
                "Cascade window size must be non-zero, got {}x{}",
                self.size.0,
                self.size.1
            ));
        }

        for (index, stage) in self.stages.iter().enumerate() {
            if stage.threshold.is_nan() {
                return Err(anyhow::anyhow!("Stage {} has a NaN threshold", index));
            }
            if stage.features.iter().any(|f| f.rectangles.is_empty()) {
                return Err(anyhow::anyhow!("Stage {} has a feature without rectangles", index));
            }
        }

        Ok(())
    }

    pub fn base_width(&self) -> u32 {
        self.size.0
    }

    pub fn base_height(&self) -> u32 {
        self.size.1
    }

    /// A cascade without stages would accept every window, so it counts as empty
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Runs a cascade against windows of one canvas
pub struct CascadeEvaluator<'a> {
    cascade: &'a Cascade,
    tables: &'a IntegralTables,
}

impl<'a> CascadeEvaluator<'a> {
    pub fn new(cascade: &'a Cascade, tables: &'a IntegralTables) -> Self {
        Self { cascade, tables }
    }

    /// Decide whether the window at `(x, y)` of size `base * scale` holds an object.
    ///
    /// Flat windows (variance <= 0) are rejected outright. Stages run in order
    /// and the first stage scoring below its threshold rejects the window.
    pub fn evaluate(&self, x: u32, y: u32, scale: f64) -> bool {
        if self.cascade.is_empty() || self.tables.is_empty() {
            return false;
        }

        let x = x as f64;
        let y = y as f64;
        let width = self.cascade.base_width() as f64 * scale;
        let height = self.cascade.base_height() as f64 * scale;
        let area = width * height;

        if !(area > 0.0) {
            return false;
        }

        let mean = self.tables.rect_sum(x, y, width, height) / area;
        let variance = self.tables.rect_square_sum(x, y, width, height) / area - mean * mean;

        if !(variance > 0.0) {
            return false;
        }

        let normalization = variance.sqrt() * 0.5;

        for stage in &self.cascade.stages {
            let mut stage_sum = 0.0;

            for feature in &stage.features {
                let mut feature_sum = 0.0;

                for weighted in &feature.rectangles {
                    let rect = &weighted.rect;
                    let rect_sum = self.tables.rect_sum(
                        x + rect.x as f64 * scale,
                        y + rect.y as f64 * scale,
                        rect.width as f64 * scale,
                        rect.height as f64 * scale,
                    );
                    feature_sum += rect_sum * weighted.weight;
                }

                feature_sum /= normalization;

                stage_sum += if feature_sum < feature.threshold {
                    feature.left_value
                } else {
                    feature.right_value
                };
            }

            if stage_sum < stage.threshold {
                return false;
            }
        }

        true
    }
}
