//! JPEG encoding of key images
//!
//! The LCDs only accept baseline JPEG. Frames arrive as RGBA; the alpha
//! channel is dropped before compression.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;

/// Errors from the still-image encoder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("RGBA buffer is {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("JPEG codec error: {0}")]
    Codec(String),
}

/// An RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `RRGGBB` or `#RRGGBB`
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(1, 100)
}

/// Compress an RGBA buffer of `width`×`height` pixels
pub fn encode_rgba(
    rgba: &[u8],
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(EncodeError::BufferSize {
            expected,
            actual: rgba.len(),
        });
    }

    let rgb: Vec<u8> = rgba
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    encode_rgb(&rgb, width, height, quality)
}

fn encode_rgb(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, clamp_quality(quality))
        .write_image(rgb, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::Codec(e.to_string()))?;
    Ok(out)
}

/// Single-color square image of `size`×`size` pixels
pub fn solid_color(color: Rgb, size: u32, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let pixels = size as usize * size as usize;
    let rgb: Vec<u8> = std::iter::repeat([color.r, color.g, color.b])
        .take(pixels)
        .flatten()
        .collect();
    encode_rgb(&rgb, size, size, quality)
}
