//! Inference context
//!
//! Owns everything a request needs and is built exactly once at startup:
//! the label set, the treatment table, the two views of the network (plain
//! inference and autodiff for Grad-CAM) and the precomputed Grad-CAM split.
//! Nothing in it changes after construction.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use burn::module::{AutodiffModule, Module};
use burn::tensor::Tensor;
use image::RgbImage;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::predictor::Prediction;
use super::preprocess;
use crate::backend::{backend_name, default_device, DefaultBackend, DefaultDevice, GradBackend};
use crate::config::ServiceConfig;
use crate::explain::{grad_cam, render_overlay, GradCamSplit, Heatmap};
use crate::labels::LabelSet;
use crate::model::{load_weights, Classifier, WeightStatus, BASE_MODEL_TYPE};
use crate::treatment::TreatmentTable;
use crate::utils::error::{LeafCamError, Result};
use crate::utils::StageTimer;

/// The same weights on both backends
struct Networks {
    model: Classifier<DefaultBackend>,
    grad_model: Classifier<GradBackend>,
}

/// Classification plus saliency for one image
#[derive(Debug, Clone)]
pub struct Analysis {
    pub prediction: Prediction,
    /// `None` when Grad-CAM could not be computed
    pub heatmap: Option<Heatmap>,
    /// Input after resizing, the overlay background
    pub image: RgbImage,
}

/// Response body of a diagnosis
#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub plant: String,
    pub disease: String,
    /// Percentage in [0, 100], two decimals
    pub confidence: f64,
    pub treatments: Vec<String>,
    /// Base64 PNG overlay, `null` if saliency failed
    pub heatmap: Option<String>,
}

/// Operational snapshot for health checks
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub model_loaded: bool,
    pub weights_loaded: bool,
    pub weights: WeightStatus,
    pub num_classes: usize,
    pub base_model_type: String,
    pub tap_layer: String,
    pub tap_layer_found: bool,
    pub backend: String,
}

/// Shared, read-only inference state
pub struct InferenceContext {
    config: ServiceConfig,
    labels: LabelSet,
    treatments: TreatmentTable,
    networks: Mutex<Networks>,
    split: Option<GradCamSplit>,
    weights: WeightStatus,
    device: DefaultDevice,
}

impl InferenceContext {
    /// Read the treatment table named in `config` and build the context.
    ///
    /// Fails if the table is missing or empty; a missing checkpoint only
    /// produces a warning.
    pub fn load(config: ServiceConfig) -> Result<Self> {
        let treatments = TreatmentTable::load(&config.treatment_data)?;
        info!(
            "Loaded {} treatment entries from {:?}",
            treatments.len(),
            config.treatment_data
        );
        Self::from_treatments(config, treatments)
    }

    /// Build the context around an already loaded treatment table
    pub fn from_treatments(config: ServiceConfig, treatments: TreatmentTable) -> Result<Self> {
        config.validate()?;

        let labels = treatments.label_set();
        if labels.is_empty() {
            return Err(LeafCamError::TreatmentData(
                "treatment table has no labels".to_string(),
            ));
        }

        let device = default_device();
        info!(
            "Building {} classifier with {} classes on {}",
            BASE_MODEL_TYPE,
            labels.len(),
            backend_name()
        );

        let initialized: Classifier<GradBackend> =
            config.model.classifier_config(labels.len()).init(&device);
        let (grad_model, weights) = match load_weights(initialized.clone(), &config.weights, &device)
        {
            (loaded, WeightStatus::Loaded(path)) if loaded.head.num_classes() != labels.len() => {
                warn!(
                    "Checkpoint {:?} has {} outputs but {} labels are configured - ignoring it",
                    path,
                    loaded.head.num_classes(),
                    labels.len()
                );
                (initialized, WeightStatus::Initialized)
            }
            outcome => outcome,
        };

        // Weights are frozen: only the tap activation is differentiated.
        let grad_model = grad_model.no_grad();
        let model = grad_model.clone().valid();

        let split = GradCamSplit::resolve(&model.backbone, &config.tap_layer);
        match &split {
            Some(split) => info!(
                "Grad-CAM tap layer '{}' at position {}",
                split.tap_layer(),
                split.tap_index()
            ),
            None => warn!(
                "Tap layer '{}' not found in backbone - heatmaps disabled",
                config.tap_layer
            ),
        }

        Ok(Self {
            config,
            labels,
            treatments,
            networks: Mutex::new(Networks { model, grad_model }),
            split,
            weights,
            device,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn treatments(&self) -> &TreatmentTable {
        &self.treatments
    }

    pub fn weights(&self) -> &WeightStatus {
        &self.weights
    }

    pub fn split(&self) -> Option<&GradCamSplit> {
        self.split.as_ref()
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            model_loaded: true,
            weights_loaded: self.weights.is_loaded(),
            weights: self.weights.clone(),
            num_classes: self.labels.len(),
            base_model_type: BASE_MODEL_TYPE.to_string(),
            tap_layer: self.config.tap_layer.clone(),
            tap_layer_found: self.split.is_some(),
            backend: backend_name().to_string(),
        }
    }

    // A panic inside a forward pass leaves the weights untouched.
    fn lock_networks(&self) -> MutexGuard<'_, Networks> {
        self.networks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Classify an encoded image and compute its Grad-CAM heatmap.
    ///
    /// Only decoding and classification errors are returned; a saliency
    /// failure is logged and yields `heatmap: None`.
    pub fn analyze(&self, bytes: &[u8]) -> Result<Analysis> {
        let timer = StageTimer::start("preprocess");
        let prepared = preprocess::prepare(
            bytes,
            self.config.model.image_size,
            self.config.normalization,
        )?;
        timer.finish();

        let input = prepared.to_tensor::<DefaultBackend>(&self.device);
        let networks = self.lock_networks();

        let start = Instant::now();
        let probabilities = networks
            .model
            .forward_probabilities(input.clone())
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| LeafCamError::Model(format!("{:?}", e)))?;
        let prediction = Prediction::from_probabilities(&probabilities, &self.labels, start.elapsed())?;
        debug!(
            "Predicted {} ({:.2}%) in {:.1} ms",
            prediction.label, prediction.confidence, prediction.inference_time_ms
        );

        let heatmap = self.saliency(&networks, input, prediction.class_index);
        drop(networks);

        Ok(Analysis {
            prediction,
            heatmap,
            image: prepared.resized,
        })
    }

    fn saliency(
        &self,
        networks: &Networks,
        input: Tensor<DefaultBackend, 4>,
        class_index: usize,
    ) -> Option<Heatmap> {
        let Some(split) = &self.split else {
            error!(
                "Grad-CAM skipped: tap layer '{}' is not part of the backbone",
                self.config.tap_layer
            );
            return None;
        };

        let size = self.config.model.image_size;
        let timer = StageTimer::start("grad-cam");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            grad_cam::<GradBackend>(
                split,
                &networks.model,
                &networks.grad_model,
                input,
                class_index,
                (size, size),
            )
        }));
        timer.finish();

        match outcome {
            Ok(Ok(heatmap)) => Some(heatmap),
            Ok(Err(e)) => {
                error!("Grad-CAM failed for class {}: {}", class_index, e);
                None
            }
            Err(_) => {
                error!("Grad-CAM panicked for class {}", class_index);
                None
            }
        }
    }

    /// Full diagnosis: label split, confidence, treatments, encoded overlay
    pub fn diagnose(&self, bytes: &[u8]) -> Result<Diagnosis> {
        let analysis = self.analyze(bytes)?;
        let prediction = analysis.prediction;

        let heatmap = analysis.heatmap.and_then(|heatmap| {
            let timer = StageTimer::start("overlay");
            let encoded = render_overlay(&heatmap, &analysis.image, self.config.heatmap_alpha);
            timer.finish();
            match encoded {
                Ok(encoded) => Some(encoded),
                Err(e) => {
                    error!("Could not render heatmap overlay: {}", e);
                    None
                }
            }
        });

        Ok(Diagnosis {
            treatments: self.treatments.treatments(&prediction.label).to_vec(),
            plant: prediction.plant,
            disease: prediction.disease,
            confidence: prediction.confidence,
            heatmap,
        })
    }
}
