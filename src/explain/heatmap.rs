//! Single-channel saliency map

use image::{imageops::FilterType, ImageBuffer, Luma};

use crate::utils::error::{LeafCamError, Result};

/// Row-major 2-D map with one value per spatial position
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl Heatmap {
    /// Wrap row-major values; `values.len()` must equal `width * height`
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 || values.len() != (width * height) as usize {
            return Err(LeafCamError::Saliency(format!(
                "heatmap of {}x{} cannot hold {} values",
                width,
                height,
                values.len()
            )));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Clip negatives to zero and scale so the maximum is 1.
    ///
    /// A map with no positive entries stays all zeros.
    pub fn normalized(width: u32, height: u32, mut values: Vec<f32>) -> Result<Self> {
        if values.iter().any(|v| !v.is_finite()) {
            return Err(LeafCamError::Saliency(
                "class activation map contains non-finite values".to_string(),
            ));
        }

        for v in values.iter_mut() {
            *v = v.max(0.0);
        }

        let max = values.iter().copied().fold(0.0f32, f32::max);
        if max > 0.0 {
            for v in values.iter_mut() {
                *v /= max;
            }
        }

        Self::new(width, height, values)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Bilinear resize; values stay within [0, 1]
    pub fn resize(&self, width: u32, height: u32) -> Result<Self> {
        if self.dimensions() == (width, height) {
            return Ok(self.clone());
        }

        let buffer: ImageBuffer<Luma<f32>, Vec<f32>> =
            ImageBuffer::from_raw(self.width, self.height, self.values.clone()).ok_or_else(
                || LeafCamError::Saliency("heatmap buffer has the wrong length".to_string()),
            )?;
        let resized = image::imageops::resize(&buffer, width, height, FilterType::Triangle);

        let values = resized
            .into_raw()
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0))
            .collect();
        Self::new(width, height, values)
    }

    /// Quantize to 8-bit intensities (`255 * v`, truncated)
    pub fn to_intensities(&self) -> Vec<u8> {
        self.values
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0) as u8)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_length() {
        assert!(Heatmap::new(2, 2, vec![0.0; 4]).is_ok());
        assert!(Heatmap::new(2, 2, vec![0.0; 3]).is_err());
        assert!(Heatmap::new(0, 2, vec![]).is_err());
    }

    #[test]
    fn test_normalized_scales_to_unit_max() {
        let heatmap = Heatmap::normalized(2, 2, vec![-3.0, 1.0, 2.0, 4.0]).unwrap();

        assert_eq!(heatmap.values(), &[0.0, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_normalized_without_positive_entries_is_zero() {
        let heatmap = Heatmap::normalized(3, 1, vec![-1.0, -0.5, 0.0]).unwrap();

        assert!(heatmap.values().iter().all(|&v| v == 0.0));
        assert!(heatmap.values().iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_normalized_rejects_nan() {
        let err = Heatmap::normalized(2, 1, vec![f32::NAN, 1.0]).unwrap_err();
        assert!(matches!(err, LeafCamError::Saliency(_)));
    }

    #[test]
    fn test_resize_dimensions_and_range() {
        let heatmap = Heatmap::normalized(2, 2, vec![0.0, 1.0, 0.5, 0.25]).unwrap();

        let resized = heatmap.resize(224, 224).unwrap();

        assert_eq!(resized.dimensions(), (224, 224));
        assert_eq!(resized.values().len(), 224 * 224);
        assert!(resized.values().iter().all(|v| (0.0..=1.0).contains(v)));
        // Top corners keep their quadrant's ordering
        let row = &resized.values()[..224];
        assert!(row[223] > row[0]);
    }

    #[test]
    fn test_resize_uniform_stays_uniform() {
        let heatmap = Heatmap::new(7, 7, vec![0.6; 49]).unwrap();
        let resized = heatmap.resize(32, 32).unwrap();

        assert!(resized.values().iter().all(|v| (v - 0.6).abs() < 1e-4));
    }

    #[test]
    fn test_to_intensities() {
        let heatmap = Heatmap::new(3, 1, vec![0.0, 0.5, 1.0]).unwrap();
        assert_eq!(heatmap.to_intensities(), vec![0, 127, 255]);
    }
}
