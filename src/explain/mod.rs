//! Prediction explanations: Grad-CAM saliency and its visual overlay

pub mod gradcam;
pub mod heatmap;
pub mod overlay;

pub use gradcam::{class_activation_map, grad_cam, tap_gradient, GradCamSplit};
pub use heatmap::Heatmap;
pub use overlay::{render_overlay, DEFAULT_ALPHA};
