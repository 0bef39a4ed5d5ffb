//! Application state for the LeafCam server
//!
//! Holds the inference context built at startup and the server start time.

use std::sync::Arc;
use std::time::Instant;

use leafcam::InferenceContext;

/// Shared application state
pub struct AppState {
    /// Classifier, labels, treatments and Grad-CAM split, immutable after startup
    pub context: InferenceContext,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    pub fn new(context: InferenceContext) -> Self {
        Self {
            context,
            started_at: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;
