//! Interest scoring: histogram entropy and sampled luminance centroids

use image::{GenericImageView, GrayImage, Luma, Rgb, RgbImage};
use rand::Rng;
use serde::Serialize;

use super::backend;

/// Default share of pixels sampled by [`highest_energy_point`]: one in 50
pub const DEFAULT_SAMPLE_RATIO: f64 = 50.0;

/// YUV-weighted grey value of an RGB triple
pub fn rgb2luminance(r: u8, g: u8, b: u8) -> f64 {
    r as f64 * 0.299 + g as f64 * 0.587 + b as f64 * 0.114
}

/// Pixels that can be reduced to a single luminance value
pub trait Luminance {
    fn luminance(&self) -> f64;
}

impl Luminance for Rgb<u8> {
    fn luminance(&self) -> f64 {
        rgb2luminance(self[0], self[1], self[2])
    }
}

impl Luminance for Luma<u8> {
    fn luminance(&self) -> f64 {
        self[0] as f64
    }
}

/// Shannon entropy of a histogram over `area` pixels.
///
/// Empty bins are skipped, so a single-valued region scores exactly 0.
pub fn histogram_entropy(histogram: &[u32], area: u64) -> f64 {
    if area == 0 {
        return 0.0;
    }

    let mut value = 0.0;
    for &count in histogram.iter().filter(|&&count| count > 0) {
        let p = count as f64 / area as f64;
        value -= p * p.log2();
    }
    value
}

pub fn grayscale_entropy(gray: &GrayImage) -> f64 {
    let area = gray.width() as u64 * gray.height() as u64;
    histogram_entropy(&backend::histogram(gray), area)
}

/// Entropy of a colour image, with colours folded into truncated luminance bins
pub fn color_entropy(img: &RgbImage) -> f64 {
    let mut histogram = [0u32; 256];
    for pixel in img.pixels() {
        let bin = (pixel.luminance() as usize).min(255);
        histogram[bin] += 1;
    }

    let area = img.width() as u64 * img.height() as u64;
    histogram_entropy(&histogram, area)
}

/// Luminance-weighted centroid of a region with its mean sampled intensity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EnergyPoint {
    pub x: f64,
    pub y: f64,
    pub sum: f64,
}

/// Estimate the most energetic point of `image` from random samples.
///
/// Draws `round(area / sample_ratio)` pixels. Coordinates are weighted as
/// `i + 1`; a region without any luminance reports `(0, 0)`.
pub fn highest_energy_point<I, R>(image: &I, sample_ratio: f64, rng: &mut R) -> EnergyPoint
where
    I: GenericImageView,
    I::Pixel: Luminance,
    R: Rng,
{
    let (width, height) = image.dimensions();
    let area = width as u64 * height as u64;

    if area == 0 {
        return EnergyPoint::default();
    }

    let samples = (area as f64 / sample_ratio.max(f64::MIN_POSITIVE)).round() as u64;

    let mut x_center = 0.0;
    let mut y_center = 0.0;
    let mut sum = 0.0;

    for _ in 0..samples {
        let i = rng.random_range(0..width);
        let j = rng.random_range(0..height);

        let value = image.get_pixel(i, j).luminance();
        sum += value;
        x_center += (i + 1) as f64 * value;
        y_center += (j + 1) as f64 * value;
    }

    if sum > 0.0 {
        x_center /= sum;
        y_center /= sum;
    }

    EnergyPoint {
        x: x_center,
        y: y_center,
        sum: sum / area as f64,
    }
}
