//! Service configuration
//!
//! Everything the inference context needs at startup. Values can come from a
//! JSON file; the binaries override individual fields from CLI flags and
//! environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::explain::DEFAULT_ALPHA;
use crate::inference::preprocess::Normalization;
use crate::model::{ClassifierConfig, DEFAULT_DENSE_UNITS, DEFAULT_DROPOUT};
use crate::utils::error::{LeafCamError, Result};
use crate::{DEFAULT_TAP_LAYER, IMAGE_SIZE};

/// Network shape; the class count comes from the treatment table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Input image size (width and height, assumed square)
    pub image_size: u32,

    /// Backbone width multiplier
    pub width_multiplier: f32,

    /// Hidden units of the head's dense layer
    pub dense_units: usize,

    /// Head dropout rate (0.0 to 1.0)
    pub dropout_rate: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            image_size: IMAGE_SIZE,
            width_multiplier: 1.0,
            dense_units: DEFAULT_DENSE_UNITS,
            dropout_rate: DEFAULT_DROPOUT,
        }
    }
}

impl ModelSettings {
    /// Classifier configuration for `num_classes` outputs
    pub fn classifier_config(&self, num_classes: usize) -> ClassifierConfig {
        ClassifierConfig::new(num_classes)
            .with_width_multiplier(self.width_multiplier)
            .with_dense_units(self.dense_units)
            .with_dropout_rate(self.dropout_rate)
    }
}

/// Startup configuration of the inference service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Treatment table JSON; its keys define the label set
    pub treatment_data: PathBuf,

    /// Checkpoint candidates, tried in order
    pub weights: Vec<PathBuf>,

    pub model: ModelSettings,

    /// Backbone layer whose activation Grad-CAM differentiates
    pub tap_layer: String,

    /// Heatmap weight in the overlay
    pub heatmap_alpha: f32,

    pub normalization: Normalization,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            treatment_data: PathBuf::from("treatment_data.json"),
            weights: vec![
                PathBuf::from("models/plant_disease_model.mpk"),
                PathBuf::from("models/plant_disease_model_best.mpk"),
            ],
            model: ModelSettings::default(),
            tap_layer: DEFAULT_TAP_LAYER.to_string(),
            heatmap_alpha: DEFAULT_ALPHA,
            normalization: Normalization::default(),
        }
    }
}

impl ServiceConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let size = self.model.image_size;
        if size < 32 || size % 32 != 0 {
            return Err(LeafCamError::Config(format!(
                "image_size must be a multiple of 32 (at least 32), got {}",
                size
            )));
        }

        if !(self.model.width_multiplier > 0.0) {
            return Err(LeafCamError::Config(
                "width_multiplier must be positive".to_string(),
            ));
        }

        if self.model.dense_units == 0 {
            return Err(LeafCamError::Config(
                "dense_units must be greater than 0".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.model.dropout_rate) {
            return Err(LeafCamError::Config(
                "dropout_rate must be in range [0.0, 1.0)".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.heatmap_alpha) {
            return Err(LeafCamError::Config(
                "heatmap_alpha must be in range [0.0, 1.0]".to_string(),
            ));
        }

        if self.tap_layer.trim().is_empty() {
            return Err(LeafCamError::Config("tap_layer must not be empty".to_string()));
        }

        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file; missing fields take defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LeafCamError::PathNotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
