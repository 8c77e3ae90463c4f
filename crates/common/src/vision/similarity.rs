//! Composite similarity scoring for screenshot pairs
//!
//! Primary method: MSSIM over grayscale plus 3-D color-histogram
//! correlation, averaged. Fallback method: byte/size comparison with a
//! bounded perturbation, used when either input has no pixel buffer or the
//! structural metric fails. Which tier runs is an explicit branch on the
//! decoded inputs, so both paths are directly testable.

use image::{imageops::FilterType, DynamicImage, GenericImageView, GrayImage, RgbImage};
use image_compare::Algorithm;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

use super::codec::DecodedImage;

/// Per-pixel luminance difference beyond this counts as a changed pixel.
const PIXEL_DIFF_THRESHOLD: u8 = 30;

/// Minimum dimension for the windowed MSSIM; smaller images use the
/// global SSIM statistics instead.
const MSSIM_MIN_DIMENSION: u32 = 8;

/// How the similarity score was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMethod {
    /// MSSIM + histogram correlation over pixel buffers
    Structural,
    /// Byte/size comparison; approximate, discount accordingly
    ByteFallback,
}

/// Result of comparing two screenshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub ssim_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_difference_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histogram_correlation: Option<f64>,
    pub overall_similarity: f64,
    pub method: SimilarityMethod,
    pub dimensions_matched: bool,
}

/// Bounded perturbation applied to fallback scores.
///
/// The fallback formula is intentionally approximate; the perturbation
/// keeps it from looking falsely precise. Seedable so tests can pin it.
#[derive(Debug, Clone, Default)]
pub struct Jitter {
    seed: Option<u64>,
}

impl Jitter {
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    pub fn from_entropy() -> Self {
        Self { seed: None }
    }

    /// Sample a perturbation in [-0.05, 0.05].
    pub fn sample(&self) -> f64 {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        rng.gen_range(-0.05..=0.05)
    }
}

/// Similarity scorer. Stateless apart from the injected jitter source.
#[derive(Debug, Clone, Default)]
pub struct SimilarityEngine {
    jitter: Jitter,
}

impl SimilarityEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jitter(jitter: Jitter) -> Self {
        Self { jitter }
    }

    /// Compare two decoded screenshots. Never fails: any degradation is
    /// reflected in the `method` field instead.
    pub fn compare(&self, before: &DecodedImage, after: &DecodedImage) -> SimilarityResult {
        match (&before.pixels, &after.pixels) {
            (Some(a), Some(b)) => match self.structural(a, b) {
                Ok(result) => result,
                Err(e) => {
                    warn!("structural comparison degraded to byte fallback: {}", e);
                    self.byte_fallback(before, after)
                }
            },
            _ => self.byte_fallback(before, after),
        }
    }

    fn structural(&self, before: &DynamicImage, after: &DynamicImage) -> Result<SimilarityResult> {
        let dimensions_matched = before.dimensions() == after.dimensions();

        let (bw, bh) = before.dimensions();
        let (aw, ah) = after.dimensions();
        let width = bw.min(aw);
        let height = bh.min(ah);
        if width == 0 || height == 0 {
            return Err(Error::AnalysisDegraded("zero-area image".to_string()));
        }

        // Resample both to the shared minimum size; never upscale.
        let before = reconcile(before, width, height);
        let after = reconcile(after, width, height);

        let gray_before = before.to_luma8();
        let gray_after = after.to_luma8();

        let ssim_score = if width < MSSIM_MIN_DIMENSION || height < MSSIM_MIN_DIMENSION {
            global_ssim(&gray_before, &gray_after)
        } else {
            image_compare::gray_similarity_structure(
                &Algorithm::MSSIMSimple,
                &gray_before,
                &gray_after,
            )
            .map_err(|e| Error::AnalysisDegraded(format!("mssim: {}", e)))?
            .score
        };

        let pixel_difference_percent = pixel_difference_percent(&gray_before, &gray_after);

        let histogram = histogram_correlation(&before.to_rgb8(), &after.to_rgb8());

        Ok(SimilarityResult {
            ssim_score: round4(ssim_score),
            pixel_difference_percent: Some(round2(pixel_difference_percent)),
            histogram_correlation: Some(round4(histogram)),
            overall_similarity: round4((ssim_score + histogram) / 2.0),
            method: SimilarityMethod::Structural,
            dimensions_matched,
        })
    }

    fn byte_fallback(&self, before: &DecodedImage, after: &DecodedImage) -> SimilarityResult {
        if before.bytes == after.bytes {
            return SimilarityResult {
                ssim_score: 1.0,
                pixel_difference_percent: None,
                histogram_correlation: None,
                overall_similarity: 1.0,
                method: SimilarityMethod::ByteFallback,
                dimensions_matched: true,
            };
        }

        let longest = before.bytes.len().max(after.bytes.len()).max(1) as f64;
        let size_diff = (before.bytes.len() as f64 - after.bytes.len() as f64).abs() / longest;
        let score = ((1.0 - size_diff).max(0.0) + self.jitter.sample()).clamp(0.0, 1.0);
        let score = round4(score);

        let dimensions_matched = match (
            before.metadata.width.zip(before.metadata.height),
            after.metadata.width.zip(after.metadata.height),
        ) {
            (Some(b), Some(a)) => b == a,
            _ => false,
        };

        SimilarityResult {
            ssim_score: score,
            pixel_difference_percent: None,
            histogram_correlation: None,
            overall_similarity: score,
            method: SimilarityMethod::ByteFallback,
            dimensions_matched,
        }
    }
}

/// Resize to the target dimensions unless already there.
pub(crate) fn reconcile(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if image.dimensions() == (width, height) {
        image.clone()
    } else {
        image.resize_exact(width, height, FilterType::Triangle)
    }
}

/// Percentage of pixels whose luminance difference exceeds the threshold.
fn pixel_difference_percent(before: &GrayImage, after: &GrayImage) -> f64 {
    let total = before.pixels().len();
    if total == 0 {
        return 0.0;
    }

    let changed = before
        .pixels()
        .zip(after.pixels())
        .filter(|(a, b)| a.0[0].abs_diff(b.0[0]) > PIXEL_DIFF_THRESHOLD)
        .count();

    changed as f64 / total as f64 * 100.0
}

/// Global SSIM over luminance, contrast and structure statistics.
/// Used for images below the MSSIM window size.
fn global_ssim(before: &GrayImage, after: &GrayImage) -> f64 {
    let n = before.pixels().len() as f64;
    if n == 0.0 {
        return 0.0;
    }

    let mut sum_a = 0.0;
    let mut sum_b = 0.0;
    for (a, b) in before.pixels().zip(after.pixels()) {
        sum_a += a.0[0] as f64;
        sum_b += b.0[0] as f64;
    }
    let mean_a = sum_a / n;
    let mean_b = sum_b / n;

    let mut var_a = 0.0;
    let mut var_b = 0.0;
    let mut covar = 0.0;
    for (a, b) in before.pixels().zip(after.pixels()) {
        let da = a.0[0] as f64 - mean_a;
        let db = b.0[0] as f64 - mean_b;
        var_a += da * da;
        var_b += db * db;
        covar += da * db;
    }
    var_a /= n;
    var_b /= n;
    covar /= n;

    // Standard SSIM stabilizers for 8-bit dynamic range
    let c1 = 6.5025;
    let c2 = 58.5225;

    let numerator = (2.0 * mean_a * mean_b + c1) * (2.0 * covar + c2);
    let denominator = (mean_a * mean_a + mean_b * mean_b + c1) * (var_a + var_b + c2);

    (numerator / denominator).clamp(0.0, 1.0)
}

const HISTOGRAM_BINS: usize = 8;

fn color_histogram(image: &RgbImage) -> Vec<f64> {
    let mut histogram = vec![0.0f64; HISTOGRAM_BINS * HISTOGRAM_BINS * HISTOGRAM_BINS];
    for pixel in image.pixels() {
        // 256 values / 8 bins = 32 per bin
        let r = (pixel.0[0] >> 5) as usize;
        let g = (pixel.0[1] >> 5) as usize;
        let b = (pixel.0[2] >> 5) as usize;
        histogram[(r * HISTOGRAM_BINS + g) * HISTOGRAM_BINS + b] += 1.0;
    }
    histogram
}

/// Pearson correlation between the 3-D color histograms of two images.
pub(crate) fn histogram_correlation(before: &RgbImage, after: &RgbImage) -> f64 {
    let hist_a = color_histogram(before);
    let hist_b = color_histogram(after);
    pearson(&hist_a, &hist_b)
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut covar = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        covar += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denominator = (var_a * var_b).sqrt();
    if denominator == 0.0 {
        if a == b {
            1.0
        } else {
            0.0
        }
    } else {
        covar / denominator
    }
}

pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_image(width: u32, height: u32, pixel: impl Fn(u32, u32) -> [u8; 4]) -> DecodedImage {
        let img = RgbaImage::from_fn(width, height, |x, y| Rgba(pixel(x, y)));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).expect("encode png");
        DecodedImage::from_bytes(buf.into_inner()).expect("decode")
    }

    fn metadata_only(bytes: &[u8]) -> DecodedImage {
        let img = DecodedImage::from_bytes(bytes.to_vec()).expect("within size limit");
        assert!(img.pixels.is_none());
        img
    }

    #[test]
    fn test_identity_is_exactly_one() {
        let img = png_image(32, 32, |x, y| [(x * 8) as u8, (y * 8) as u8, 128, 255]);
        let result = SimilarityEngine::new().compare(&img, &img);

        assert_eq!(result.method, SimilarityMethod::Structural);
        assert_eq!(result.overall_similarity, 1.0);
        assert_eq!(result.pixel_difference_percent, Some(0.0));
        assert!(result.dimensions_matched);
    }

    #[test]
    fn test_primary_method_is_idempotent() {
        let before = png_image(32, 32, |x, _| [(x * 8) as u8, 10, 10, 255]);
        let after = png_image(32, 32, |_, y| [10, (y * 8) as u8, 10, 255]);
        let engine = SimilarityEngine::new();

        let first = engine.compare(&before, &after);
        let second = engine.compare(&before, &after);

        assert_eq!(first.overall_similarity, second.overall_similarity);
        assert_eq!(first.ssim_score, second.ssim_score);
        assert_eq!(first.histogram_correlation, second.histogram_correlation);
        assert_eq!(first.pixel_difference_percent, second.pixel_difference_percent);
    }

    #[test]
    fn test_tiny_images_stay_on_primary_tier() {
        let img = png_image(1, 1, |_, _| [200, 50, 50, 255]);
        let result = SimilarityEngine::new().compare(&img, &img);

        assert_eq!(result.method, SimilarityMethod::Structural);
        assert_eq!(result.overall_similarity, 1.0);
    }

    #[test]
    fn test_dimension_mismatch_is_recorded() {
        let small = png_image(16, 16, |_, _| [50, 50, 50, 255]);
        let large = png_image(32, 16, |_, _| [50, 50, 50, 255]);
        let result = SimilarityEngine::new().compare(&small, &large);

        assert_eq!(result.method, SimilarityMethod::Structural);
        assert!(!result.dimensions_matched);
    }

    #[test]
    fn test_fallback_identical_bytes_score_one() {
        let img = metadata_only(b"the same opaque payload");
        let result = SimilarityEngine::new().compare(&img, &img.clone());

        assert_eq!(result.method, SimilarityMethod::ByteFallback);
        assert_eq!(result.overall_similarity, 1.0);
    }

    #[test]
    fn test_fallback_jitter_is_seeded_and_bounded() {
        let before = metadata_only(b"aaaaaaaaaaaaaaaaaaaa");
        let after = metadata_only(b"aaaaaaaaaaaaaaaaaa");

        let engine = SimilarityEngine::with_jitter(Jitter::seeded(7));
        let first = engine.compare(&before, &after);
        let second = engine.compare(&before, &after);
        assert_eq!(first.overall_similarity, second.overall_similarity);

        // base = 1 - 2/20 = 0.9; jitter bounded by +/- 0.05
        assert!(first.overall_similarity >= 0.85 - 1e-9);
        assert!(first.overall_similarity <= 0.95 + 1e-9);
    }

    #[test]
    fn test_jitter_range() {
        for seed in 0..50 {
            let sample = Jitter::seeded(seed).sample();
            assert!((-0.05..=0.05).contains(&sample), "seed {} out of range", seed);
        }
    }

    #[test]
    fn test_histogram_correlation_identical() {
        let img = png_image(16, 16, |x, y| [(x * 16) as u8, (y * 16) as u8, 0, 255]);
        let rgb = img.pixels.as_ref().unwrap().to_rgb8();
        assert!((histogram_correlation(&rgb, &rgb) - 1.0).abs() < 1e-9);
    }
}
