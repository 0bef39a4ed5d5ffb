//! # LeafCam
//!
//! Plant-leaf disease diagnosis with visual explanations, built on the Burn framework.
//!
//! ## Features
//!
//! - **Classification** of leaf photos with a frozen MobileNetV2 backbone and a trained head
//! - **Grad-CAM saliency** showing which regions drove the predicted class
//! - **Overlay rendering** of the saliency map as a base64 PNG for clients
//! - **Treatment lookup** from a static JSON table keyed by disease label
//!
//! ## Modules
//!
//! - `model`: MobileNetV2 backbone, classification head and checkpoint loading
//! - `explain`: Grad-CAM computation, heatmaps and overlays
//! - `inference`: Preprocessing, predictions and the shared inference context
//! - `treatment` / `labels`: Label set and treatment advice
//! - `config`: Service configuration
//! - `utils`: Logging, error types and formatting helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use leafcam::{InferenceContext, ServiceConfig};
//!
//! let context = InferenceContext::load(ServiceConfig::default())?;
//! let diagnosis = context.diagnose(&std::fs::read("leaf.jpg")?)?;
//! println!("{} / {} ({:.2}%)", diagnosis.plant, diagnosis.disease, diagnosis.confidence);
//! ```

pub mod backend;
pub mod config;
pub mod explain;
pub mod inference;
pub mod labels;
pub mod model;
pub mod treatment;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{ModelSettings, ServiceConfig};
pub use explain::{GradCamSplit, Heatmap};
pub use inference::{Diagnosis, InferenceContext, ModelStatus, Normalization, Prediction};
pub use labels::{split_label, LabelSet};
pub use model::{Classifier, ClassifierConfig, WeightStatus};
pub use treatment::{TreatmentEntry, TreatmentTable};
pub use utils::error::{LeafCamError, Result};

/// Network input resolution (width and height)
pub const IMAGE_SIZE: u32 = 224;

/// Backbone layer tapped for Grad-CAM: the last convolution before pooling
pub const DEFAULT_TAP_LAYER: &str = "Conv_1";

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
