//! Diagnosis endpoint

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use leafcam::Diagnosis;
use tracing::{error, info, warn};

use crate::state::SharedState;

/// Multipart field carrying the image
pub const UPLOAD_FIELD: &str = "file";

/// Run a diagnosis on the blocking pool.
///
/// Decoding failures map to 400, everything else to 500.
pub async fn diagnose_upload(
    state: SharedState,
    bytes: Vec<u8>,
) -> Result<Diagnosis, (StatusCode, String)> {
    let outcome = tokio::task::spawn_blocking(move || state.context.diagnose(&bytes))
        .await
        .map_err(|e| {
            error!("Inference task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Inference task failed: {}", e),
            )
        })?;

    outcome.map_err(|e| {
        if e.is_client_error() {
            warn!("Rejected upload: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        } else {
            error!("Diagnosis failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    })
}

/// POST /predict - Classify an uploaded leaf image
pub async fn predict(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<Diagnosis>, (StatusCode, String)> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            info!("Received {} ({} bytes)", file_name, data.len());
            upload = Some(data);
            break;
        }
    }

    let bytes = upload.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("No file uploaded (expected multipart field '{}')", UPLOAD_FIELD),
        )
    })?;

    let diagnosis = diagnose_upload(state, bytes.to_vec()).await?;
    info!(
        "Diagnosis: {} / {} ({:.2}%), heatmap {}",
        diagnosis.plant,
        diagnosis.disease,
        diagnosis.confidence,
        if diagnosis.heatmap.is_some() { "attached" } else { "unavailable" }
    );

    Ok(Json(diagnosis))
}
