//! Model module for the leaf disease classifier, built with Burn
//!
//! This module provides:
//! - A MobileNetV2 feature extractor addressable layer by layer
//! - The trainable classification head
//! - The composed classifier and checkpoint loading
//!
//! ## Architecture
//!
//! ```text
//! input [1, 3, 224, 224]
//!   └─ MobileNetV2 (frozen)        Conv1 … block_16, Conv_1, Conv_1_bn, out_relu
//!        └─ head                   global_pool, dense, dropout, classifier
//!             └─ softmax           [1, num_classes]
//! ```

pub mod classifier;
pub mod head;
pub mod mobilenet;

// Re-export main types for convenience
pub use classifier::{load_weights, Classifier, ClassifierConfig, WeightStatus};
pub use head::{ClassifierHead, ClassifierHeadConfig, HEAD_LAYERS};
pub use mobilenet::{BackboneLayer, MobileNetV2, MobileNetV2Config};

/// Name reported for the feature extractor
pub const BASE_MODEL_TYPE: &str = "MobileNetV2";

/// Default dropout rate of the head
pub const DEFAULT_DROPOUT: f64 = 0.5;

/// Default hidden units of the head's dense layer
pub const DEFAULT_DENSE_UNITS: usize = 256;
