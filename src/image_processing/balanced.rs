//! Quadrant energy balancing: one sampled centroid per quadrant, combined
//! into a weighted centre for the crop window.

use anyhow::Result;
use image::{imageops, GenericImageView};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::backend;
use super::energy::{highest_energy_point, EnergyPoint, Luminance, DEFAULT_SAMPLE_RATIO};
use super::geometry::CropOffset;
use super::{CropContext, CropStrategy};
use crate::utils::verbose_println;

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Top-left coordinate centred on `center`, shifted back inside `[0, size - target]`
fn clamp_offset(center: f64, target: u32, size: u32) -> u32 {
    let mut top_left = (center - target as f64 / 2.0).max(0.0) as i64;
    let (target, size) = (target as i64, size as i64);

    if top_left + target > size {
        top_left -= top_left + target - size;
    }

    top_left.max(0) as u32
}

/// Weighted mean of the points, or the origin when nothing carries weight
pub fn weighted_center(points: &[EnergyPoint]) -> (f64, f64) {
    let total: f64 = points.iter().map(|p| p.sum).sum();
    if !(total > 0.0) {
        return (0.0, 0.0);
    }

    points.iter().fold((0.0, 0.0), |(x, y), p| {
        (x + p.x * (p.sum / total), y + p.y * (p.sum / total))
    })
}

pub struct QuadrantBalancer {
    sample_ratio: f64,
    seed: Option<u64>,
    rng: StdRng,
    verbose: bool,
}

impl Default for QuadrantBalancer {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATIO, None)
    }
}

impl QuadrantBalancer {
    /// `seed` makes sampling reproducible; `None` draws from the OS
    pub fn new(sample_ratio: f64, seed: Option<u64>) -> Self {
        Self {
            sample_ratio,
            seed,
            rng: make_rng(seed),
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Restart the sampling stream from the configured seed
    pub fn reset(&mut self) {
        self.rng = make_rng(self.seed);
    }

    pub fn offset<I>(&mut self, image: &I, target_width: u32, target_height: u32) -> CropOffset
    where
        I: GenericImageView + Sync,
        I::Pixel: Luminance,
    {
        let (width, height) = image.dimensions();
        let half_width = width.div_ceil(2);
        let half_height = height.div_ceil(2);

        let origins = [
            (0, 0),
            (half_width, 0),
            (0, half_height),
            (half_width, half_height),
        ];
        // One independent stream per quadrant, derived in a fixed order
        let seeds: [u64; 4] = std::array::from_fn(|_| self.rng.random());
        let sample_ratio = self.sample_ratio;

        let points: Vec<EnergyPoint> = origins
            .par_iter()
            .zip(seeds.par_iter())
            .map(|(&(ox, oy), &seed)| {
                let quadrant = imageops::crop_imm(image, ox, oy, half_width, half_height);
                let mut rng = StdRng::seed_from_u64(seed);
                let point = highest_energy_point(&*quadrant, sample_ratio, &mut rng);

                EnergyPoint {
                    x: point.x + ox as f64,
                    y: point.y + oy as f64,
                    sum: point.sum,
                }
            })
            .collect();

        let (center_x, center_y) = weighted_center(&points);
        let offset = CropOffset::new(
            clamp_offset(center_x, target_width, width),
            clamp_offset(center_y, target_height, height),
        );

        verbose_println(
            self.verbose,
            &format!(
                "Balanced centre ({:.1}, {:.1}) -> offset ({}, {})",
                center_x, center_y, offset.x, offset.y
            ),
        );

        offset
    }
}

/// Centres the crop on the energy of the edge map
pub struct BalancedStrategy {
    balancer: QuadrantBalancer,
}

impl BalancedStrategy {
    pub fn new(balancer: QuadrantBalancer) -> Self {
        Self { balancer }
    }
}

impl CropStrategy for BalancedStrategy {
    fn special_offset(
        &mut self,
        ctx: &CropContext,
        target_width: u32,
        target_height: u32,
    ) -> Result<CropOffset> {
        let measured = backend::measure_image(ctx.image);
        Ok(self.balancer.offset(&measured, target_width, target_height))
    }

    fn reset(&mut self) {
        self.balancer.reset();
    }
}
