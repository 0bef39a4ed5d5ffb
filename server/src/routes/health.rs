//! Health check endpoint

use axum::{extract::State, Json};
use leafcam::{ModelStatus, WeightStatus};
use serde::Serialize;

use crate::state::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub model_loaded: bool,
    pub weights_loaded: bool,
    pub weights: WeightStatus,
    pub num_classes: usize,
    pub base_model_type: String,
    pub tap_layer: String,
    pub tap_layer_found: bool,
    pub backend: String,
}

/// GET /health - Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let ModelStatus {
        model_loaded,
        weights_loaded,
        weights,
        num_classes,
        base_model_type,
        tap_layer,
        tap_layer_found,
        backend,
    } = state.context.status();

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded,
        weights_loaded,
        weights,
        num_classes,
        base_model_type,
        tap_layer,
        tap_layer_found,
        backend,
    })
}
