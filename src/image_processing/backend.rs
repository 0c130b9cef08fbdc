//! Pixel operations the crop engine relies on: measurement filters, blur,
//! histograms, cropping and resampling.

use anyhow::Result;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{imageops, GrayImage, ImageBuffer, Luma, Pixel, RgbImage};
use imageproc::filter::{filter3x3, gaussian_blur_f32, separable_filter_equal};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use strum_macros::{Display, EnumString};

use super::energy::rgb2luminance;

/// Edge kernel of radius 1: each pixel against its eight neighbours
const EDGE_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];

/// Values below this become black after edge detection
pub const BLACK_THRESHOLD: u8 = 7;

/// Resampling filter used when scaling the source to cover the target
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ResizeFilter {
    Nearest,
    Bilinear,
    #[default]
    CatmullRom,
    Lanczos3,
}

impl ResizeFilter {
    fn algorithm(self) -> ResizeAlg {
        match self {
            ResizeFilter::Nearest => ResizeAlg::Nearest,
            ResizeFilter::Bilinear => ResizeAlg::Convolution(FilterType::Bilinear),
            ResizeFilter::CatmullRom => ResizeAlg::Convolution(FilterType::CatmullRom),
            ResizeFilter::Lanczos3 => ResizeAlg::Convolution(FilterType::Lanczos3),
        }
    }
}

/// Grayscale copy using the 0.299/0.587/0.114 luminance weights
pub fn desaturate(img: &RgbImage) -> GrayImage {
    ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y);
        let lum = rgb2luminance(p[0], p[1], p[2]);
        Luma([lum.round().clamp(0.0, 255.0) as u8])
    })
}

/// Per-channel edge filter; results are clamped to the channel range
pub fn edge_detect(img: &RgbImage) -> RgbImage {
    filter3x3(img, &EDGE_KERNEL)
}

/// Force every value below `cutoff` to black, leave the rest untouched
pub fn black_threshold(gray: &GrayImage, cutoff: u8) -> GrayImage {
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        if pixel[0] < cutoff {
            pixel[0] = 0;
        }
    }
    out
}

/// Edge map used by the energy strategies: edges, desaturated, with the
/// faint noise floor removed
pub fn measure_image(img: &RgbImage) -> GrayImage {
    let edges = edge_detect(img);
    let gray = desaturate(&edges);
    black_threshold(&gray, BLACK_THRESHOLD)
}

/// Gaussian blur over a `2 * radius + 1` window.
///
/// A radius of 0 lets the kernel size follow sigma.
pub fn blur(gray: &GrayImage, radius: u32, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return gray.clone();
    }
    if radius == 0 {
        return gaussian_blur_f32(gray, sigma);
    }

    let r = radius as i32;
    let mut kernel: Vec<f32> = (-r..=r)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f32 = kernel.iter().sum();
    for weight in kernel.iter_mut() {
        *weight /= total;
    }

    separable_filter_equal(gray, &kernel)
}

/// 256-bin intensity histogram
pub fn histogram(gray: &GrayImage) -> [u32; 256] {
    let hist = imageproc::stats::histogram(gray);
    hist.channels[0]
}

/// Crop a region, failing when it does not fit inside the image
pub fn crop<P>(
    img: &ImageBuffer<P, Vec<P::Subpixel>>,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>>
where
    P: Pixel + 'static,
{
    let (img_width, img_height) = img.dimensions();

    if x as u64 + width as u64 > img_width as u64 || y as u64 + height as u64 > img_height as u64
    {
        return Err(anyhow::anyhow!(
            "Crop dimensions exceed image bounds: crop({},{},{}x{}) on {}x{} image",
            x,
            y,
            width,
            height,
            img_width,
            img_height
        ));
    }

    Ok(imageops::crop_imm(img, x, y, width, height).to_image())
}

/// Resample an RGB image to exact dimensions
pub fn resize(img: &RgbImage, width: u32, height: u32, filter: ResizeFilter) -> Result<RgbImage> {
    let (src_width, src_height) = img.dimensions();

    if src_width == width && src_height == height {
        return Ok(img.clone());
    }

    let src_width_nz =
        NonZeroU32::new(src_width).ok_or_else(|| anyhow::anyhow!("Source width is zero"))?;
    let src_height_nz =
        NonZeroU32::new(src_height).ok_or_else(|| anyhow::anyhow!("Source height is zero"))?;
    let dst_width_nz =
        NonZeroU32::new(width).ok_or_else(|| anyhow::anyhow!("Target width is zero"))?;
    let dst_height_nz =
        NonZeroU32::new(height).ok_or_else(|| anyhow::anyhow!("Target height is zero"))?;

    let src_image = Image::from_vec_u8(
        src_width_nz.get(),
        src_height_nz.get(),
        img.as_raw().clone(),
        PixelType::U8x3,
    )?;
    let mut dst_image = Image::new(dst_width_nz.get(), dst_height_nz.get(), PixelType::U8x3);

    let options = ResizeOptions::new().resize_alg(filter.algorithm());
    let mut resizer = Resizer::new();
    resizer.resize(&src_image, &mut dst_image, Some(&options))?;

    RgbImage::from_raw(width, height, dst_image.buffer().to_vec())
        .ok_or_else(|| anyhow::anyhow!("Resized buffer does not match {}x{}", width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::str::FromStr;

    fn create_test_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_crop_image() {
        let img = create_test_image(100, 100);
        let cropped = crop(&img, 10, 10, 50, 50).unwrap();

        assert_eq!(cropped.dimensions(), (50, 50));
        assert_eq!(img.get_pixel(15, 15), cropped.get_pixel(5, 5));
    }

    #[test]
    fn test_crop_bounds_validation() {
        let img = create_test_image(50, 50);

        assert!(crop(&img, 10, 10, 50, 50).is_err());
        assert!(crop(&img, 10, 10, 40, 40).is_ok());
        assert!(crop(&img, u32::MAX, 0, 2, 2).is_err());
    }

    #[test]
    fn test_resize_image() {
        let img = create_test_image(100, 80);

        for filter in [
            ResizeFilter::Nearest,
            ResizeFilter::Bilinear,
            ResizeFilter::CatmullRom,
            ResizeFilter::Lanczos3,
        ] {
            let resized = resize(&img, 50, 40, filter).unwrap();
            assert_eq!(resized.dimensions(), (50, 40));
        }
    }

    #[test]
    fn test_resize_rejects_zero_target() {
        let img = create_test_image(10, 10);
        assert!(resize(&img, 0, 5, ResizeFilter::default()).is_err());
    }

    #[test]
    fn test_desaturate_uses_luminance_weights() {
        let img = ImageBuffer::from_pixel(2, 2, Rgb([255u8, 0, 0]));
        let gray = desaturate(&img);
        // 255 * 0.299 = 76.245
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let img = ImageBuffer::from_pixel(8, 8, Rgb([120u8, 40, 200]));
        let measured = measure_image(&img);
        assert!(measured.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_edge_detect_finds_boundary() {
        let img = ImageBuffer::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgb([0u8, 0, 0])
            } else {
                Rgb([255u8, 255, 255])
            }
        });
        let measured = measure_image(&img);

        assert!(measured.get_pixel(5, 5)[0] > 0);
        assert_eq!(measured.get_pixel(8, 5)[0], 0);
    }

    #[test]
    fn test_black_threshold() {
        let gray = GrayImage::from_fn(3, 1, |x, _| Luma([[3u8, 7, 200][x as usize]]));
        let out = black_threshold(&gray, 7);

        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(1, 0)[0], 7);
        assert_eq!(out.get_pixel(2, 0)[0], 200);
    }

    #[test]
    fn test_blur_preserves_flat_regions() {
        let gray = GrayImage::from_pixel(12, 12, Luma([90u8]));
        let blurred = blur(&gray, 3, 2.0);
        assert!(blurred.pixels().all(|p| (p[0] as i32 - 90).abs() <= 1));
    }

    #[test]
    fn test_blur_spreads_a_spike() {
        let mut gray = GrayImage::new(11, 11);
        gray.put_pixel(5, 5, Luma([255]));
        let blurred = blur(&gray, 3, 2.0);

        assert!(blurred.get_pixel(5, 5)[0] < 255);
        assert!(blurred.get_pixel(6, 5)[0] > 0);
    }

    #[test]
    fn test_histogram_counts_every_pixel() {
        let gray = GrayImage::from_fn(4, 4, |x, _| Luma([if x < 2 { 10 } else { 20 }]));
        let hist = histogram(&gray);

        assert_eq!(hist[10], 8);
        assert_eq!(hist[20], 8);
        assert_eq!(hist.iter().sum::<u32>(), 16);
    }

    #[test]
    fn test_resize_filter_names() {
        assert_eq!(ResizeFilter::CatmullRom.to_string(), "catmull-rom");
        assert_eq!(ResizeFilter::from_str("lanczos3").unwrap(), ResizeFilter::Lanczos3);
        assert_eq!(ResizeFilter::default(), ResizeFilter::CatmullRom);
    }
}
