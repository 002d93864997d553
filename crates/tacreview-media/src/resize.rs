//! Frame normalization: aspect-preserving downscale and JPEG encoding.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, RgbImage};

use crate::error::MediaResult;

/// Dimensions that fit `width`x`height` inside a `max_side` box.
///
/// Preserves aspect ratio and never upscales.
pub fn fit_within(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_side || longer == 0 {
        return (width, height);
    }

    let scale = max_side as f64 / longer as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_side);
    (scaled(width), scaled(height))
}

/// A frame image ready for transport.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Downscale an image to `max_side` and encode it as JPEG.
pub fn normalize(image: &DynamicImage, max_side: u32, quality: u8) -> MediaResult<EncodedFrame> {
    let rgb = image.to_rgb8();
    let (width, height) = fit_within(rgb.width(), rgb.height(), max_side);

    let rgb: RgbImage = if (width, height) == rgb.dimensions() {
        rgb
    } else {
        imageops::resize(&rgb, width, height, FilterType::Lanczos3)
    };

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).encode(
        rgb.as_raw(),
        width,
        height,
        ColorType::Rgb8,
    )?;

    Ok(EncodedFrame {
        width,
        height,
        bytes,
    })
}
