//! Entropy slicing: trim an oversized axis one strip at a time, dropping the
//! strip with less detail unless a safe zone says otherwise.

use anyhow::Result;
use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::backend;
use super::energy::grayscale_entropy;
use super::geometry::{CropOffset, SafeZone};
use super::{CropContext, CropStrategy};
use crate::utils::verbose_println;

/// How much larger one side's potential must be before the other is cut anyway
pub const POTENTIAL_RATIO: f64 = 1.5;
/// The surplus of an axis is trimmed in this many strips at most
pub const SLICE_DIVISIONS: u32 = 25;
pub const BLUR_RADIUS: u32 = 3;
pub const BLUR_SIGMA: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    /// Trims columns, yields the x offset
    Horizontal,
    /// Trims rows, yields the y offset
    Vertical,
}

/// Largest extent of a safe zone touching any coordinate in `[start, end)`.
///
/// Along the horizontal axis a zone covers `left..=right` and is worth its
/// height; along the vertical axis it covers `top..=bottom` and is worth its
/// width. Zero means the strip can be removed freely.
pub fn potential(zones: &[SafeZone], axis: Axis, start: i64, end: i64) -> f64 {
    if end <= start {
        return 0.0;
    }

    zones
        .iter()
        .filter_map(|zone| {
            let (low, high, value) = match axis {
                Axis::Horizontal => (zone.left, zone.right, zone.height()),
                Axis::Vertical => (zone.top, zone.bottom, zone.width()),
            };
            let overlaps = low as i64 <= end - 1 && high as i64 >= start && low <= high;
            overlaps.then_some(value as f64)
        })
        .fold(0.0, f64::max)
}

/// Cached entropy of one strip, valid while its start and size are unchanged
#[derive(Debug, Clone, Copy)]
struct StripEntropy {
    start: u32,
    size: u32,
    value: f64,
}

#[derive(Debug, Clone)]
pub struct EntropySlicer {
    potential_ratio: f64,
    slice_divisions: u32,
    verbose: bool,
}

impl Default for EntropySlicer {
    fn default() -> Self {
        Self::new(POTENTIAL_RATIO, SLICE_DIVISIONS)
    }
}

impl EntropySlicer {
    pub fn new(potential_ratio: f64, slice_divisions: u32) -> Self {
        Self {
            potential_ratio,
            slice_divisions: slice_divisions.max(1),
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Blur the measured image, then slice both axes
    pub fn offset(
        &self,
        measured: &GrayImage,
        target_width: u32,
        target_height: u32,
        zones: &[SafeZone],
    ) -> Result<CropOffset> {
        let blurred = backend::blur(measured, BLUR_RADIUS, BLUR_SIGMA);

        let x = self.slice(&blurred, target_width, Axis::Horizontal, zones)?;
        let y = self.slice(&blurred, target_height, Axis::Vertical, zones)?;

        Ok(CropOffset::new(x, y))
    }

    /// Find the start of the `target`-long window to keep along `axis`.
    ///
    /// The candidate interval `[top, bottom)` shrinks by one strip per round
    /// until it is exactly `target` long.
    pub fn slice(&self, image: &GrayImage, target: u32, axis: Axis, zones: &[SafeZone]) -> Result<u32> {
        let original = match axis {
            Axis::Horizontal => image.width(),
            Axis::Vertical => image.height(),
        };

        if target == 0 {
            return Err(anyhow::anyhow!("Target size must be greater than zero"));
        }
        if target > original {
            return Err(anyhow::anyhow!(
                "Target size {} exceeds image size {} along {:?} axis",
                target,
                original,
                axis
            ));
        }

        let mut step = (original - target).div_ceil(self.slice_divisions);
        let mut top = 0u32;
        let mut bottom = original;

        let mut leading: Option<StripEntropy> = None;
        let mut trailing: Option<StripEntropy> = None;

        while bottom - top > target {
            step = step.min(bottom - top - target);

            let leading_potential = potential(zones, axis, top as i64, (top + step) as i64);
            let trailing_potential =
                potential(zones, axis, (bottom - step) as i64, bottom as i64);

            let mut cut_leading = leading_potential <= 0.0;
            let mut cut_trailing = trailing_potential <= 0.0;

            // Both sides protected: sacrifice the clearly weaker one
            if !cut_leading && !cut_trailing {
                if leading_potential * self.potential_ratio < trailing_potential {
                    cut_leading = true;
                } else if leading_potential > trailing_potential * self.potential_ratio {
                    cut_trailing = true;
                }
            }

            let drop_leading = if cut_leading != cut_trailing {
                cut_leading
            } else {
                let a = strip_entropy(&mut leading, image, axis, top, step)?;
                let b = strip_entropy(&mut trailing, image, axis, bottom - step, step)?;
                a < b
            };

            if drop_leading {
                top += step;
                leading = None;
            } else {
                bottom -= step;
                trailing = None;
            }
        }

        verbose_println(
            self.verbose,
            &format!("{:?} slice: keeping {}..{} of {}", axis, top, bottom, original),
        );

        Ok(top)
    }
}

fn strip_entropy(
    cache: &mut Option<StripEntropy>,
    image: &GrayImage,
    axis: Axis,
    start: u32,
    size: u32,
) -> Result<f64> {
    if let Some(strip) = cache {
        if strip.start == start && strip.size == size {
            return Ok(strip.value);
        }
    }

    let strip = match axis {
        Axis::Horizontal => backend::crop(image, start, 0, size, image.height())?,
        Axis::Vertical => backend::crop(image, 0, start, image.width(), size)?,
    };
    let value = grayscale_entropy(&strip);

    *cache = Some(StripEntropy { start, size, value });
    Ok(value)
}

/// Keeps the most detailed region of the edge map
pub struct EntropyStrategy {
    slicer: EntropySlicer,
}

impl EntropyStrategy {
    pub fn new(slicer: EntropySlicer) -> Self {
        Self { slicer }
    }
}

impl CropStrategy for EntropyStrategy {
    fn special_offset(
        &mut self,
        ctx: &CropContext,
        target_width: u32,
        target_height: u32,
    ) -> Result<CropOffset> {
        let measured = backend::measure_image(ctx.image);
        self.slicer.offset(&measured, target_width, target_height, &[])
    }
}
