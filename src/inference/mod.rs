//! Inference module: from uploaded bytes to a diagnosis
//!
//! This module provides:
//! - Image decoding, resizing and normalization
//! - Probability vector → labelled prediction
//! - The shared [`InferenceContext`] that runs classification and Grad-CAM
//!
//! ## Request flow
//!
//! ```text
//! bytes ─ prepare ─ classifier ─ Prediction ─┬─ treatments
//!                                            └─ Grad-CAM ─ overlay (base64 PNG)
//! ```

pub mod engine;
pub mod predictor;
pub mod preprocess;

// Re-export main types for convenience
pub use engine::{Analysis, Diagnosis, InferenceContext, ModelStatus};
pub use predictor::{ClassProbability, Prediction, TOP_K};
pub use preprocess::{prepare, Normalization, PreparedImage};
