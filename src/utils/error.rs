//! Error Handling Module
//!
//! Defines the error type shared by the inference pipeline, the saliency
//! computation, and the service configuration. Uses thiserror for ergonomic
//! error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for leafcam operations
#[derive(Error, Debug)]
pub enum LeafCamError {
    /// Uploaded bytes could not be decoded as an image
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Treatment table could not be read or is unusable
    #[error("Treatment data error: {0}")]
    TreatmentData(String),

    /// Predicted index has no matching label
    #[error("No label for class index {index} (label set has {len} entries)")]
    UnknownLabel { index: usize, len: usize },

    /// Error with model construction or forward passes
    #[error("Model error: {0}")]
    Model(String),

    /// Grad-CAM could not be computed
    #[error("Saliency error: {0}")]
    Saliency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Image encoding error
    #[error("Image encoding error: {0}")]
    Image(String),
}

impl LeafCamError {
    /// Whether the error was caused by the request rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, LeafCamError::InvalidImage(_))
    }
}

impl From<serde_json::Error> for LeafCamError {
    fn from(err: serde_json::Error) -> Self {
        LeafCamError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for LeafCamError {
    fn from(err: image::ImageError) -> Self {
        LeafCamError::Image(err.to_string())
    }
}

/// Convenience Result type for leafcam operations
pub type Result<T> = std::result::Result<T, LeafCamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LeafCamError::Saliency("tap layer missing".to_string());
        assert_eq!(format!("{}", err), "Saliency error: tap layer missing");
    }

    #[test]
    fn test_unknown_label_display() {
        let err = LeafCamError::UnknownLabel { index: 7, len: 3 };
        assert!(err.to_string().contains("index 7"));
        assert!(err.to_string().contains("3 entries"));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(LeafCamError::InvalidImage("truncated".to_string()).is_client_error());
        assert!(!LeafCamError::Model("boom".to_string()).is_client_error());
        assert!(!LeafCamError::Saliency("boom".to_string()).is_client_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LeafCamError = io_err.into();
        assert!(matches!(err, LeafCamError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: LeafCamError = json_err.into();
        assert!(matches!(err, LeafCamError::Serialization(_)));
    }
}
