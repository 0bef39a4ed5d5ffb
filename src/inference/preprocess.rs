//! Image preprocessing
//!
//! Decodes an upload, converts it to RGB, resizes it to the network input
//! resolution, and normalizes it into a `[1, 3, S, S]` tensor.

use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::utils::error::{LeafCamError, Result};

/// ImageNet normalization mean values (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet normalization std values (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Per-channel normalization applied before the forward pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Scale pixels to [-1, 1] (MobileNetV2's training distribution)
    #[default]
    MobileNet,
    /// Subtract the ImageNet mean and divide by its std
    ImageNet,
}

impl Normalization {
    /// Normalize one 8-bit channel value
    pub fn apply(&self, value: u8, channel: usize) -> f32 {
        match self {
            Normalization::MobileNet => value as f32 / 127.5 - 1.0,
            Normalization::ImageNet => {
                (value as f32 / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
            }
        }
    }
}

/// An upload after decoding and resizing
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// RGB image at network resolution, used as the overlay background
    pub resized: RgbImage,
    /// Normalized pixels in CHW order
    pub values: Vec<f32>,
}

impl PreparedImage {
    /// Side length of the square input
    pub fn size(&self) -> usize {
        self.resized.width() as usize
    }

    /// Single-element batch tensor of shape [1, 3, size, size]
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4> {
        let size = self.size();
        Tensor::from_floats(TensorData::new(self.values.clone(), [1, 3, size, size]), device)
    }
}

/// Decode an uploaded image in any format the `image` crate understands
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(LeafCamError::InvalidImage("upload is empty".to_string()));
    }
    image::load_from_memory(bytes).map_err(|e| LeafCamError::InvalidImage(e.to_string()))
}

/// Convert to RGB and resize to `size` x `size` with bicubic filtering
pub fn resize_rgb(image: &DynamicImage, size: u32) -> RgbImage {
    let rgb = image.to_rgb8();
    if rgb.dimensions() == (size, size) {
        return rgb;
    }
    image::imageops::resize(&rgb, size, size, FilterType::CatmullRom)
}

/// Normalize an RGB image into a flat CHW vector
pub fn normalize(rgb: &RgbImage, normalization: Normalization) -> Vec<f32> {
    let (width, height) = rgb.dimensions();
    let num_pixels = (width * height) as usize;

    let mut normalized = vec![0.0f32; 3 * num_pixels];
    for (i, pixel) in rgb.pixels().enumerate() {
        for channel in 0..3 {
            normalized[channel * num_pixels + i] = normalization.apply(pixel[channel], channel);
        }
    }

    normalized
}

/// Decode, resize, and normalize an upload
pub fn prepare(bytes: &[u8], size: u32, normalization: Normalization) -> Result<PreparedImage> {
    let image = decode_image(bytes)?;
    let resized = resize_rgb(&image, size);
    let values = normalize(&resized, normalization);
    Ok(PreparedImage { resized, values })
}
