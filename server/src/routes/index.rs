//! Service banner

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct Endpoint {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

#[derive(Serialize)]
pub struct IndexResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<Endpoint>,
}

/// GET / - Service description
pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        service: "LeafCam plant disease diagnosis",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec![
            Endpoint {
                method: "POST",
                path: "/predict",
                description: "Multipart upload (field 'file'); returns plant, disease, confidence, treatments and a Grad-CAM heatmap",
            },
            Endpoint {
                method: "GET",
                path: "/health",
                description: "Model, label and tap layer status",
            },
        ],
    })
}
