//! Leaf disease classifier: frozen MobileNetV2 backbone + trainable head
//!
//! The network is loaded once at startup. Weight loading never fails hard:
//! when no checkpoint can be read the freshly initialized weights are kept and
//! [`WeightStatus::Initialized`] is reported so operators can tell.

use std::path::{Path, PathBuf};

use burn::{
    config::Config,
    module::Module,
    record::CompactRecorder,
    tensor::{activation::softmax, backend::Backend, Tensor},
};
use serde::Serialize;
use tracing::{info, warn};

use super::head::{ClassifierHead, ClassifierHeadConfig};
use super::mobilenet::{MobileNetV2, MobileNetV2Config};

/// Configuration for the composed classifier
#[derive(Config, Debug)]
pub struct ClassifierConfig {
    /// Number of output classes (size of the label set)
    pub num_classes: usize,

    /// Backbone width multiplier
    #[config(default = "1.0")]
    pub width_multiplier: f32,

    /// Hidden units of the head's dense layer
    #[config(default = "256")]
    pub dense_units: usize,

    /// Head dropout rate
    #[config(default = "0.5")]
    pub dropout_rate: f64,
}

impl ClassifierConfig {
    /// Initialize the classifier
    pub fn init<B: Backend>(&self, device: &B::Device) -> Classifier<B> {
        let backbone_config = MobileNetV2Config::new().with_width_multiplier(self.width_multiplier);
        let backbone = backbone_config.init(device);
        let head = ClassifierHeadConfig::new(backbone.out_channels(), self.num_classes)
            .with_dense_units(self.dense_units)
            .with_dropout_rate(self.dropout_rate)
            .init(device);

        Classifier {
            backbone,
            head,
            num_classes: self.num_classes,
        }
    }
}

/// MobileNetV2 features followed by the classification head
#[derive(Module, Debug)]
pub struct Classifier<B: Backend> {
    pub backbone: MobileNetV2<B>,
    pub head: ClassifierHead<B>,
    num_classes: usize,
}

impl<B: Backend> Classifier<B> {
    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.backbone.forward(x);
        self.head.forward(features)
    }

    /// Forward pass with softmax for inference
    pub fn forward_probabilities(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(x), 1)
    }

    /// Get the number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

/// Where the classifier's weights came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "path", rename_all = "lowercase")]
pub enum WeightStatus {
    /// Loaded from this checkpoint
    Loaded(PathBuf),
    /// No checkpoint could be read; predictions are unreliable
    Initialized,
}

impl WeightStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, WeightStatus::Loaded(_))
    }
}

/// Whether a checkpoint exists, with or without the recorder's extension
fn checkpoint_exists(path: &Path) -> bool {
    path.exists() || path.with_extension("mpk").exists()
}

/// Load weights from the first readable checkpoint in `candidates`.
///
/// Every failure is logged and the next candidate tried. If none load, the
/// model is returned unchanged together with [`WeightStatus::Initialized`].
pub fn load_weights<B: Backend>(
    model: Classifier<B>,
    candidates: &[PathBuf],
    device: &B::Device,
) -> (Classifier<B>, WeightStatus) {
    let recorder = CompactRecorder::new();

    for path in candidates {
        if !checkpoint_exists(path) {
            warn!("Checkpoint not found: {:?}", path);
            continue;
        }

        match model.clone().load_file(path.clone(), &recorder, device) {
            Ok(loaded) => {
                info!("Model weights loaded from {:?}", path);
                return (loaded, WeightStatus::Loaded(path.clone()));
            }
            Err(e) => warn!("Could not load weights from {:?}: {:?}", path, e),
        }
    }

    warn!("No checkpoint loaded - using initialized weights, predictions will be unreliable!");
    (model, WeightStatus::Initialized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn small_config() -> ClassifierConfig {
        ClassifierConfig::new(4)
            .with_width_multiplier(0.35)
            .with_dense_units(16)
    }

    #[test]
    fn test_classifier_output_shape() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 64, 64], &device);

        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 4]);
        assert_eq!(model.num_classes(), 4);
        assert_eq!(model.head.num_classes(), 4);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &device);

        let probs: Vec<f32> = model
            .forward_probabilities(input)
            .into_data()
            .to_vec()
            .unwrap();

        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_load_weights_falls_back_when_missing() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device);
        let candidates = vec![PathBuf::from("/nonexistent/leafcam/model.mpk")];

        let (_, status) = load_weights(model, &candidates, &device);

        assert_eq!(status, WeightStatus::Initialized);
        assert!(!status.is_loaded());
    }

    #[test]
    fn test_load_weights_round_trip() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leafcam_model");

        small_config()
            .init::<TestBackend>(&device)
            .save_file(path.clone(), &CompactRecorder::new())
            .unwrap();

        let fresh = small_config().init::<TestBackend>(&device);
        let missing = dir.path().join("missing");
        let (_, status) = load_weights(fresh, &[missing, path.clone()], &device);

        assert_eq!(status, WeightStatus::Loaded(path));
    }
}
