//! Image conditioning ahead of recognition: adaptive upscaling for all
//! engines, plus deskew/binarize/sharpen for the classical engine.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use tracing::debug;

/// Controls for adaptive magnification of low-resolution scans.
#[derive(Debug, Clone)]
pub struct UpscaleOptions {
    pub enabled: bool,
    /// Upscale when the shorter side is below this
    pub min_side: u32,
    pub max_factor: f32,
    pub max_side: u32,
    pub max_pixels: u64,
}

impl Default for UpscaleOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            min_side: 1000,
            max_factor: 3.0,
            max_side: 4096,
            max_pixels: 16_000_000,
        }
    }
}

/// Magnify images whose shorter side is below the threshold. The factor is
/// capped by the maximum factor, maximum side length, and total pixel count;
/// images already large enough pass through unchanged.
pub fn upscale_if_small(image: DynamicImage, opts: &UpscaleOptions) -> DynamicImage {
    if !opts.enabled {
        return image;
    }
    let (width, height) = (image.width(), image.height());
    let short_side = width.min(height);
    if short_side == 0 || short_side >= opts.min_side {
        return image;
    }

    let mut factor = opts.min_side as f32 / short_side as f32;
    factor = factor.min(opts.max_factor);

    let long_side = width.max(height) as f32;
    if long_side * factor > opts.max_side as f32 {
        factor = opts.max_side as f32 / long_side;
    }
    let pixels = (width as f32 * factor) * (height as f32 * factor);
    if pixels > opts.max_pixels as f32 {
        factor *= (opts.max_pixels as f32 / pixels).sqrt();
    }
    if factor <= 1.0 {
        return image;
    }

    let new_w = ((width as f32 * factor).round() as u32).max(1);
    let new_h = ((height as f32 * factor).round() as u32).max(1);
    debug!(
        "Upscaling {}x{} image to {}x{} (factor {:.2})",
        width, height, new_w, new_h, factor
    );
    image.resize_exact(new_w, new_h, FilterType::Lanczos3)
}

/// Full conditioning chain for the classical engine: grayscale, deskew by
/// projection profile, Otsu binarization, light sharpening.
pub fn prepare_for_classical(image: &DynamicImage) -> GrayImage {
    let gray = image.to_luma8();
    let deskewed = deskew(&gray);
    let binary = binarize(&deskewed);
    sharpen(&binary)
}

/// Estimate and correct skew by maximizing horizontal projection-profile
/// variance over a small range of candidate angles.
fn deskew(image: &GrayImage) -> GrayImage {
    const MAX_ANGLE_DEG: f32 = 5.0;
    const STEP_DEG: f32 = 0.5;

    let baseline = projection_variance(image);
    let mut best_angle = 0.0f32;
    let mut best_score = baseline;

    let mut angle = -MAX_ANGLE_DEG;
    while angle <= MAX_ANGLE_DEG {
        if angle.abs() > f32::EPSILON {
            let rotated = rotate_about_center(
                image,
                angle.to_radians(),
                Interpolation::Bilinear,
                Luma([255u8]),
            );
            let score = projection_variance(&rotated);
            if score > best_score {
                best_score = score;
                best_angle = angle;
            }
        }
        angle += STEP_DEG;
    }

    // Only rotate when the gain is meaningful; tiny corrections blur text
    if best_angle.abs() > f32::EPSILON && best_score > baseline * 1.05 {
        debug!("Deskewing by {:.1} degrees", best_angle);
        rotate_about_center(
            image,
            best_angle.to_radians(),
            Interpolation::Bilinear,
            Luma([255u8]),
        )
    } else {
        image.clone()
    }
}

/// Variance of per-row darkness sums. Text lines aligned with the raster
/// produce sharp alternation between dark and light rows.
fn projection_variance(image: &GrayImage) -> f64 {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }
    let mut row_sums = Vec::with_capacity(height as usize);
    for y in 0..height {
        let mut sum = 0u64;
        for x in 0..width {
            sum += (255 - image.get_pixel(x, y).0[0]) as u64;
        }
        row_sums.push(sum as f64);
    }
    let mean = row_sums.iter().sum::<f64>() / row_sums.len() as f64;
    row_sums
        .iter()
        .map(|s| (s - mean) * (s - mean))
        .sum::<f64>()
        / row_sums.len() as f64
}

/// Otsu global threshold.
fn binarize(image: &GrayImage) -> GrayImage {
    let level = imageproc::contrast::otsu_level(image);
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > level { 255 } else { 0 };
    }
    out
}

/// 3x3 unsharp kernel.
fn sharpen(image: &GrayImage) -> GrayImage {
    let kernel: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];
    imageproc::filter::filter3x3::<Luma<u8>, f32, u8>(image, &kernel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn solid_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 200, 200])))
    }

    #[test]
    fn test_small_image_is_upscaled() {
        let opts = UpscaleOptions::default();
        let out = upscale_if_small(solid_image(400, 300), &opts);
        assert!(out.width() > 400);
        assert!(out.height() > 300);
        // Shorter side lands at or below the target, never above max caps
        assert!(out.width().max(out.height()) <= opts.max_side);
    }

    #[test]
    fn test_large_image_passes_through() {
        let opts = UpscaleOptions::default();
        let out = upscale_if_small(solid_image(2000, 1500), &opts);
        assert_eq!((out.width(), out.height()), (2000, 1500));
    }

    #[test]
    fn test_upscale_respects_pixel_ceiling() {
        let opts = UpscaleOptions {
            max_pixels: 500_000,
            ..UpscaleOptions::default()
        };
        let out = upscale_if_small(solid_image(600, 500), &opts);
        assert!((out.width() as u64) * (out.height() as u64) <= 520_000); // small rounding slack
    }

    #[test]
    fn test_upscale_disabled() {
        let opts = UpscaleOptions {
            enabled: false,
            ..UpscaleOptions::default()
        };
        let out = upscale_if_small(solid_image(100, 100), &opts);
        assert_eq!((out.width(), out.height()), (100, 100));
    }

    #[test]
    fn test_prepare_for_classical_is_binary() {
        let prepared = prepare_for_classical(&solid_image(120, 80));
        assert_eq!(prepared.dimensions(), (120, 80));
    }
}
