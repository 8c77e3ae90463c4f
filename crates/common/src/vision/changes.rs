//! Discrete visual-change detection
//!
//! Runs an ordered sequence of independent checks (dimension, format,
//! color mode, pixel level, color palette, structure, brightness) over a
//! screenshot pair and emits one record per detected category. When pixel
//! buffers are unavailable the whole sequence is replaced by a single
//! byte-size check tagged as degraded; primary and fallback records are
//! never mixed.

use image::{GenericImageView, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use super::codec::DecodedImage;
use super::similarity::{histogram_correlation, reconcile};

/// Mean per-channel difference below this is ignored entirely.
const PIXEL_MEAN_THRESHOLD: f64 = 5.0;

/// Sobel magnitude above this classifies a pixel as an edge.
const EDGE_MAGNITUDE_THRESHOLD: u8 = 30;

/// Severity of a detected change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Page area a change is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeArea {
    Overall,
    Encoding,
    Color,
    Content,
    Styling,
    Layout,
    Lighting,
}

/// Kind of detected change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Dimension,
    Format,
    Mode,
    Pixel,
    Color,
    Structure,
    Brightness,
    Size,
}

/// One detected visual difference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub area: ChangeArea,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub description: String,
    pub severity: Severity,
    pub before_value: String,
    pub after_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Stateless change detector
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detect visual changes between two decoded screenshots. Detection
    /// order is fixed; all applicable categories are emitted.
    pub fn detect(
        &self,
        before: &DecodedImage,
        after: &DecodedImage,
        _tolerance: f64,
    ) -> Vec<ChangeRecord> {
        match (&before.pixels, &after.pixels) {
            (Some(before_px), Some(after_px))
                if before_px.width() > 0
                    && before_px.height() > 0
                    && after_px.width() > 0
                    && after_px.height() > 0 =>
            {
                self.detect_pixelwise(before, after, before_px, after_px)
            }
            _ => self.detect_fallback(before, after),
        }
    }

    fn detect_pixelwise(
        &self,
        before: &DecodedImage,
        after: &DecodedImage,
        before_px: &image::DynamicImage,
        after_px: &image::DynamicImage,
    ) -> Vec<ChangeRecord> {
        let mut changes = Vec::new();

        // 1. Dimensions
        let (bw, bh) = before_px.dimensions();
        let (aw, ah) = after_px.dimensions();
        if (bw, bh) != (aw, ah) {
            let before_area = (bw as f64) * (bh as f64);
            let after_area = (aw as f64) * (ah as f64);
            let area_change_percent = (before_area - after_area).abs() / before_area * 100.0;
            changes.push(ChangeRecord {
                area: ChangeArea::Overall,
                kind: ChangeKind::Dimension,
                description: format!(
                    "Image dimensions changed from {}x{} to {}x{}",
                    bw, bh, aw, ah
                ),
                severity: if area_change_percent > 20.0 {
                    Severity::High
                } else {
                    Severity::Medium
                },
                before_value: format!("{}x{}", bw, bh),
                after_value: format!("{}x{}", aw, ah),
                note: None,
            });
        }

        // Remaining checks run at the shared minimum size
        let width = bw.min(aw);
        let height = bh.min(ah);
        let before_px = reconcile(before_px, width, height);
        let after_px = reconcile(after_px, width, height);

        // 2. Format
        if before.metadata.format != after.metadata.format {
            changes.push(ChangeRecord {
                area: ChangeArea::Encoding,
                kind: ChangeKind::Format,
                description: format!(
                    "Image format changed from {} to {}",
                    before.metadata.format, after.metadata.format
                ),
                severity: Severity::Low,
                before_value: before.metadata.format.to_string(),
                after_value: after.metadata.format.to_string(),
                note: None,
            });
        }

        // 3. Color mode
        let before_mode = before.metadata.mode.as_deref().unwrap_or("unknown");
        let after_mode = after.metadata.mode.as_deref().unwrap_or("unknown");
        if before_mode != after_mode {
            changes.push(ChangeRecord {
                area: ChangeArea::Color,
                kind: ChangeKind::Mode,
                description: format!(
                    "Color mode changed from {} to {}",
                    before_mode, after_mode
                ),
                severity: Severity::Medium,
                before_value: before_mode.to_string(),
                after_value: after_mode.to_string(),
                note: None,
            });
        }

        // Subsequent checks compare in a common RGB space
        let before_rgb = before_px.to_rgb8();
        let after_rgb = after_px.to_rgb8();

        // 4. Pixel-level differences
        let mean_diff = mean_channel_difference(&before_rgb, &after_rgb);
        if mean_diff > PIXEL_MEAN_THRESHOLD {
            changes.push(ChangeRecord {
                area: ChangeArea::Content,
                kind: ChangeKind::Pixel,
                description: format!("Pixel-level differences detected (avg: {:.2})", mean_diff),
                severity: if mean_diff > 30.0 {
                    Severity::High
                } else if mean_diff > 15.0 {
                    Severity::Medium
                } else {
                    Severity::Low
                },
                before_value: "baseline pixels".to_string(),
                after_value: format!("changed by {:.2}", mean_diff),
                note: None,
            });
        }

        // 5. Color palette
        let correlation = histogram_correlation(&before_rgb, &after_rgb);
        if correlation < 0.95 {
            changes.push(ChangeRecord {
                area: ChangeArea::Styling,
                kind: ChangeKind::Color,
                description: format!(
                    "Color palette differences detected (correlation: {:.3})",
                    correlation
                ),
                severity: if correlation < 0.85 {
                    Severity::Medium
                } else {
                    Severity::Low
                },
                before_value: "baseline colors".to_string(),
                after_value: format!("{:.1}% different", (1.0 - correlation) * 100.0),
                note: None,
            });
        }

        // 6. Structure / edges
        let before_gray = before_px.to_luma8();
        let after_gray = after_px.to_luma8();
        let edge_diff = edge_disagreement(&before_gray, &after_gray);
        if edge_diff > 0.05 {
            changes.push(ChangeRecord {
                area: ChangeArea::Layout,
                kind: ChangeKind::Structure,
                description: format!(
                    "Layout structure differences detected ({:.1}% edges changed)",
                    edge_diff * 100.0
                ),
                severity: if edge_diff > 0.20 {
                    Severity::High
                } else {
                    Severity::Medium
                },
                before_value: "baseline layout".to_string(),
                after_value: format!("{:.1}% structural change", edge_diff * 100.0),
                note: None,
            });
        }

        // 7. Brightness. Lighting shifts are rarely actionable alone, so
        // this never escalates above low.
        let before_brightness = mean_luminance(&before_gray);
        let after_brightness = mean_luminance(&after_gray);
        let brightness_diff = (before_brightness - after_brightness).abs();
        if brightness_diff > 15.0 {
            changes.push(ChangeRecord {
                area: ChangeArea::Lighting,
                kind: ChangeKind::Brightness,
                description: format!("Brightness level changed by {:.1}", brightness_diff),
                severity: Severity::Low,
                before_value: format!("{:.1}", before_brightness),
                after_value: format!("{:.1}", after_brightness),
                note: None,
            });
        }

        changes
    }

    /// Degraded detection from byte sizes only. Replaces the whole
    /// pixelwise sequence for this request.
    fn detect_fallback(&self, before: &DecodedImage, after: &DecodedImage) -> Vec<ChangeRecord> {
        let size_before = before.bytes.len();
        let size_after = after.bytes.len();
        if size_before == 0 {
            return Vec::new();
        }

        let size_diff_percent =
            (size_before as f64 - size_after as f64).abs() / size_before as f64 * 100.0;

        if size_diff_percent <= 5.0 {
            return Vec::new();
        }

        vec![ChangeRecord {
            area: ChangeArea::Overall,
            kind: ChangeKind::Size,
            description: format!("File size changed by {:.1}%", size_diff_percent),
            severity: if size_diff_percent > 20.0 {
                Severity::High
            } else {
                Severity::Medium
            },
            before_value: format!("{} bytes", size_before),
            after_value: format!("{} bytes", size_after),
            note: Some("Fallback detection used".to_string()),
        }]
    }
}

fn mean_channel_difference(before: &RgbImage, after: &RgbImage) -> f64 {
    let mut sum = 0u64;
    let mut count = 0u64;
    for (a, b) in before.pixels().zip(after.pixels()) {
        for channel in 0..3 {
            sum += a.0[channel].abs_diff(b.0[channel]) as u64;
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    sum as f64 / count as f64
}

fn mean_luminance(image: &GrayImage) -> f64 {
    let total = image.pixels().len();
    if total == 0 {
        return 0.0;
    }
    let sum: u64 = image.pixels().map(|p| p.0[0] as u64).sum();
    sum as f64 / total as f64
}

/// Fraction of pixels whose edge classification differs between the two
/// images, using a 3x3 Sobel magnitude filter.
fn edge_disagreement(before: &GrayImage, after: &GrayImage) -> f64 {
    let before_edges = sobel_edges(before);
    let after_edges = sobel_edges(after);

    let total = before_edges.len();
    if total == 0 {
        return 0.0;
    }

    let disagreeing = before_edges
        .iter()
        .zip(after_edges.iter())
        .filter(|(a, b)| a != b)
        .count();

    disagreeing as f64 / total as f64
}

fn sobel_edges(image: &GrayImage) -> Vec<bool> {
    let (width, height) = image.dimensions();
    let mut edges = vec![false; (width as usize) * (height as usize)];
    if width < 3 || height < 3 {
        return edges;
    }

    let gx: [[i32; 3]; 3] = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];
    let gy: [[i32; 3]; 3] = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut sum_x = 0i32;
            let mut sum_y = 0i32;
            for ky in 0..3u32 {
                for kx in 0..3u32 {
                    let value = image.get_pixel(x + kx - 1, y + ky - 1).0[0] as i32;
                    sum_x += value * gx[ky as usize][kx as usize];
                    sum_y += value * gy[ky as usize][kx as usize];
                }
            }
            let magnitude = ((sum_x * sum_x + sum_y * sum_y) as f64).sqrt().min(255.0) as u8;
            edges[(y * width + x) as usize] = magnitude > EDGE_MAGNITUDE_THRESHOLD;
        }
    }

    edges
}
