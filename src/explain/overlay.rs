//! Heatmap overlay rendering
//!
//! Colorizes a saliency map with the JET ramp, alpha-blends it over the
//! resized input image, and encodes the result as base64 PNG for transport.

use std::io::Cursor;

use base64::Engine;
use image::{imageops::FilterType, ImageFormat, Rgb, RgbImage};

use super::heatmap::Heatmap;
use crate::utils::error::{LeafCamError, Result};

/// Heatmap weight in the composite
pub const DEFAULT_ALPHA: f32 = 0.4;

/// JET color for an 8-bit intensity: blue at 0, through green, to red at 255
pub fn jet(intensity: u8) -> Rgb<u8> {
    let x = intensity as f32 / 255.0;
    let channel = |offset: f32| {
        let v = (1.5 - (4.0 * x - offset).abs()).clamp(0.0, 1.0);
        (v * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

/// Map a heatmap through the JET ramp
pub fn colorize(heatmap: &Heatmap) -> RgbImage {
    let (width, height) = heatmap.dimensions();
    let intensities = heatmap.to_intensities();

    RgbImage::from_fn(width, height, |x, y| jet(intensities[(y * width + x) as usize]))
}

/// `(1 - alpha) * original + alpha * heat`, per channel.
///
/// `original` is resized to match `heat` when their sizes differ.
pub fn blend(original: &RgbImage, heat: &RgbImage, alpha: f32) -> Result<RgbImage> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(LeafCamError::Config(format!(
            "overlay alpha must be in [0, 1], got {}",
            alpha
        )));
    }

    let (width, height) = heat.dimensions();
    let resized;
    let background = if original.dimensions() == (width, height) {
        original
    } else {
        resized = image::imageops::resize(original, width, height, FilterType::Triangle);
        &resized
    };

    let mut out = RgbImage::new(width, height);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let o = background.get_pixel(x, y);
        let h = heat.get_pixel(x, y);
        for c in 0..3 {
            let v = (1.0 - alpha) * o[c] as f32 + alpha * h[c] as f32;
            pixel[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }

    Ok(out)
}

/// PNG-encode an image and return it as standard base64
pub fn encode_png_base64(image: &RgbImage) -> Result<String> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(buffer.into_inner()))
}

/// Colorize, blend, and encode in one step
pub fn render_overlay(heatmap: &Heatmap, original: &RgbImage, alpha: f32) -> Result<String> {
    let heat = colorize(heatmap);
    let composite = blend(original, &heat, alpha)?;
    encode_png_base64(&composite)
}
