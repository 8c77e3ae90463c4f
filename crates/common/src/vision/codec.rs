//! Image payload decoding and metadata extraction
//!
//! Screenshots arrive as base64 strings (optionally wrapped in a data URI,
//! optionally missing padding). Decoding is a hard failure; pixel-level
//! parsing is not: a payload that decodes to bytes but not to pixels still
//! yields metadata, and downstream analysis degrades to byte-level methods.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Maximum accepted decoded payload size (10 MiB). Enforced before any
/// pixel parsing to bound worst-case memory use.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Detected image container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    #[serde(rename = "PNG")]
    Png,
    #[serde(rename = "JPEG")]
    Jpeg,
    #[serde(rename = "WEBP")]
    Webp,
    #[serde(rename = "BMP")]
    Bmp,
    #[serde(rename = "TIFF")]
    Tiff,
    #[serde(rename = "unknown")]
    Unknown,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Webp => "WEBP",
            ImageFormat::Bmp => "BMP",
            ImageFormat::Tiff => "TIFF",
            ImageFormat::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Image metadata, available even when structural decoding fails.
///
/// `is_valid` distinguishes "decoded successfully" from "metadata only,
/// pixel access unavailable".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub size_bytes: usize,
    pub format: ImageFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_alpha: Option<bool>,
    pub sha256: String,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A decoded screenshot: raw bytes, optional pixel buffer, metadata.
///
/// Immutable once produced. `pixels` is `None` when the payload decoded
/// from base64 but could not be parsed as an image; the analysis pipeline
/// treats that as the trigger for its explicit fallback tier.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub pixels: Option<DynamicImage>,
    pub metadata: ImageMetadata,
}

impl DecodedImage {
    /// Decode a transport-encoded screenshot payload.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = decode_base64_image(encoded)?;
        Self::from_bytes(bytes)
    }

    /// Build from raw bytes, enforcing the size guard and extracting
    /// metadata. Pixel-decode failure is recorded, not propagated.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(Error::Decode(format!(
                "image exceeds maximum size of {} bytes",
                MAX_IMAGE_BYTES
            )));
        }

        let format = detect_format(&bytes);
        let sha256 = hash_bytes(&bytes);

        match image::load_from_memory(&bytes) {
            Ok(pixels) => {
                let (width, height) = (pixels.width(), pixels.height());
                let mode = color_mode(&pixels);
                let metadata = ImageMetadata {
                    size_bytes: bytes.len(),
                    format,
                    width: Some(width),
                    height: Some(height),
                    dimensions: Some(format!("{}x{}", width, height)),
                    mode: Some(mode.to_string()),
                    has_alpha: Some(pixels.color().has_alpha()),
                    sha256,
                    is_valid: true,
                    error: None,
                };
                Ok(Self {
                    bytes,
                    pixels: Some(pixels),
                    metadata,
                })
            }
            Err(e) => {
                let metadata = ImageMetadata {
                    size_bytes: bytes.len(),
                    format,
                    width: None,
                    height: None,
                    dimensions: None,
                    mode: None,
                    has_alpha: None,
                    sha256,
                    is_valid: false,
                    error: Some(e.to_string()),
                };
                Ok(Self {
                    bytes,
                    pixels: None,
                    metadata,
                })
            }
        }
    }
}

/// Decode a base64 image string with automatic padding fix.
///
/// Strips a `base64,`-delimited data-URI prefix and surrounding whitespace,
/// then right-pads to a multiple of 4 before decoding.
pub fn decode_base64_image(encoded: &str) -> Result<Vec<u8>> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    let mut payload = match encoded.split_once("base64,") {
        Some((_, rest)) => rest,
        None => encoded,
    }
    .trim()
    .to_string();

    let missing = payload.len() % 4;
    if missing != 0 {
        payload.push_str(&"=".repeat(4 - missing));
    }

    let bytes = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| Error::Decode(format!("invalid base64 image: {}", e)))?;

    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(Error::Decode(format!(
            "image exceeds maximum size of {} bytes",
            MAX_IMAGE_BYTES
        )));
    }

    Ok(bytes)
}

/// Detect the image format, preferring the image library's own sniffing
/// and falling back to raw signature checks. Unrecognized payloads
/// classify as `Unknown` rather than failing.
pub fn detect_format(bytes: &[u8]) -> ImageFormat {
    if let Ok(format) = image::guess_format(bytes) {
        match format {
            image::ImageFormat::Png => return ImageFormat::Png,
            image::ImageFormat::Jpeg => return ImageFormat::Jpeg,
            image::ImageFormat::WebP => return ImageFormat::Webp,
            image::ImageFormat::Bmp => return ImageFormat::Bmp,
            image::ImageFormat::Tiff => return ImageFormat::Tiff,
            _ => {}
        }
    }
    sniff_signature(bytes)
}

fn sniff_signature(bytes: &[u8]) -> ImageFormat {
    if bytes.len() < 8 {
        return ImageFormat::Unknown;
    }

    if &bytes[..8] == b"\x89PNG\r\n\x1a\n" {
        ImageFormat::Png
    } else if &bytes[..2] == b"\xff\xd8" {
        ImageFormat::Jpeg
    } else if &bytes[..4] == b"RIFF" && bytes.len() >= 12 && &bytes[8..12] == b"WEBP" {
        ImageFormat::Webp
    } else if &bytes[..2] == b"BM" {
        ImageFormat::Bmp
    } else if &bytes[..4] == b"\x49\x49\x2a\x00" || &bytes[..4] == b"\x4d\x4d\x00\x2a" {
        ImageFormat::Tiff
    } else {
        ImageFormat::Unknown
    }
}

/// Color-mode tag for a decoded image (grayscale, rgb, rgba, ...).
fn color_mode(image: &DynamicImage) -> &'static str {
    use image::ColorType;

    match image.color() {
        ColorType::L8 => "grayscale",
        ColorType::La8 => "grayscale-alpha",
        ColorType::Rgb8 => "rgb",
        ColorType::Rgba8 => "rgba",
        ColorType::L16 => "grayscale16",
        ColorType::La16 => "grayscale-alpha16",
        ColorType::Rgb16 => "rgb16",
        ColorType::Rgba16 => "rgba16",
        ColorType::Rgb32F => "rgb32f",
        ColorType::Rgba32F => "rgba32f",
        _ => "unknown",
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png)
            .expect("encode png");
        buf.into_inner()
    }

    #[test]
    fn test_decode_with_data_uri_prefix() {
        let bytes = png_bytes(1, 1, [255, 0, 0, 255]);
        let encoded = format!("data:image/png;base64,{}", STANDARD.encode(&bytes));
        let decoded = decode_base64_image(&encoded).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn test_decode_repairs_missing_padding() {
        let bytes = png_bytes(1, 1, [0, 128, 255, 255]);
        let encoded = STANDARD.encode(&bytes);
        let stripped = encoded.trim_end_matches('=');
        // Only meaningful when the canonical encoding carried padding
        if stripped.len() != encoded.len() {
            let decoded = decode_base64_image(stripped).unwrap();
            assert_eq!(decoded, bytes);
        }
        let decoded = decode_base64_image(&format!("  {}\n", encoded)).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn test_size_guard_boundary() {
        let at_limit = STANDARD.encode(vec![0u8; MAX_IMAGE_BYTES]);
        assert!(decode_base64_image(&at_limit).is_ok());

        let over_limit = STANDARD.encode(vec![0u8; MAX_IMAGE_BYTES + 1]);
        match decode_base64_image(&over_limit) {
            Err(Error::Decode(msg)) => assert!(msg.contains("maximum size")),
            other => panic!("expected decode error, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_signature_sniffing() {
        assert_eq!(sniff_signature(b"\x89PNG\r\n\x1a\nxxxx"), ImageFormat::Png);
        assert_eq!(sniff_signature(b"\xff\xd8\xff\xe0JFIFxx"), ImageFormat::Jpeg);
        assert_eq!(sniff_signature(b"RIFF\x00\x00\x00\x00WEBPVP8 "), ImageFormat::Webp);
        assert_eq!(sniff_signature(b"BM\x00\x00\x00\x00\x00\x00"), ImageFormat::Bmp);
        assert_eq!(sniff_signature(b"\x49\x49\x2a\x00\x00\x00\x00\x00"), ImageFormat::Tiff);
        assert_eq!(sniff_signature(b"\x4d\x4d\x00\x2a\x00\x00\x00\x00"), ImageFormat::Tiff);
        assert_eq!(sniff_signature(b"not an image"), ImageFormat::Unknown);
        assert_eq!(sniff_signature(b"x"), ImageFormat::Unknown);
    }

    #[test]
    fn test_valid_png_metadata() {
        let bytes = png_bytes(4, 2, [10, 20, 30, 255]);
        let img = DecodedImage::from_bytes(bytes.clone()).unwrap();

        assert!(img.pixels.is_some());
        assert!(img.metadata.is_valid);
        assert_eq!(img.metadata.format, ImageFormat::Png);
        assert_eq!(img.metadata.width, Some(4));
        assert_eq!(img.metadata.height, Some(2));
        assert_eq!(img.metadata.dimensions.as_deref(), Some("4x2"));
        assert_eq!(img.metadata.mode.as_deref(), Some("rgba"));
        assert_eq!(img.metadata.has_alpha, Some(true));
        assert_eq!(img.metadata.size_bytes, bytes.len());
    }

    #[test]
    fn test_unparseable_bytes_keep_metadata() {
        let img = DecodedImage::from_bytes(b"definitely not pixels".to_vec()).unwrap();
        assert!(img.pixels.is_none());
        assert!(!img.metadata.is_valid);
        assert_eq!(img.metadata.format, ImageFormat::Unknown);
        assert!(img.metadata.error.is_some());
        assert_eq!(img.metadata.size_bytes, 21);
    }
}
