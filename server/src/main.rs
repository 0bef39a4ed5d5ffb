//! LeafCam Server
//!
//! HTTP API for plant disease diagnosis. Accepts a leaf photo, returns the
//! predicted plant and disease, treatment advice and a Grad-CAM heatmap
//! overlay.

mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use leafcam::utils::logging::{init_logging, LogConfig, LogLevel};
use leafcam::{InferenceContext, ServiceConfig};

use crate::state::AppState;

/// LeafCam Server
#[derive(Parser, Debug)]
#[command(name = "leafcam-server")]
#[command(version)]
#[command(about = "HTTP API for plant disease diagnosis with Grad-CAM")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "8000", env = "LEAFCAM_PORT")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "LEAFCAM_HOST")]
    host: String,

    /// JSON service configuration
    #[arg(short, long, env = "LEAFCAM_CONFIG")]
    config: Option<PathBuf>,

    /// Treatment table JSON (defines the label set)
    #[arg(long, env = "LEAFCAM_TREATMENT_DATA")]
    treatment_data: Option<PathBuf>,

    /// Checkpoint to load; may be repeated, first readable wins
    #[arg(long, env = "LEAFCAM_WEIGHTS", value_delimiter = ',')]
    weights: Vec<PathBuf>,

    /// Backbone layer to tap for Grad-CAM
    #[arg(long, env = "LEAFCAM_TAP_LAYER")]
    tap_layer: Option<String>,

    /// Heatmap weight in the overlay (0.0-1.0)
    #[arg(long, env = "LEAFCAM_HEATMAP_ALPHA")]
    alpha: Option<f32>,

    /// Maximum upload size in megabytes
    #[arg(long, default_value = "10", env = "LEAFCAM_MAX_UPLOAD_MB")]
    max_upload_mb: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LEAFCAM_LOG_LEVEL")]
    log_level: String,
}

impl Cli {
    /// Start from the config file (or defaults) and apply flag overrides
    fn service_config(&self) -> anyhow::Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::load(path)?,
            None => ServiceConfig::default(),
        };

        if let Some(treatment_data) = &self.treatment_data {
            config.treatment_data = treatment_data.clone();
        }
        if !self.weights.is_empty() {
            config.weights = self.weights.clone();
        }
        if let Some(tap_layer) = &self.tap_layer {
            config.tap_layer = tap_layer.clone();
        }
        if let Some(alpha) = self.alpha {
            config.heatmap_alpha = alpha;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&LogConfig::production().with_level(LogLevel::parse(&cli.log_level)))?;

    // Build configuration
    let config = cli.service_config()?;

    info!("LeafCam Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Treatment data: {:?}", config.treatment_data);
    info!("  Weights:        {:?}", config.weights);
    info!("  Tap layer:      {}", config.tap_layer);
    info!("  Heatmap alpha:  {}", config.heatmap_alpha);
    info!("  Max upload:     {} MB", cli.max_upload_mb);

    // Load model and treatment table once; failures here are fatal
    let context = InferenceContext::load(config)?;
    if !context.weights().is_loaded() {
        warn!("Serving with initialized weights - diagnoses are not meaningful");
    }

    // Create shared state
    let state = Arc::new(AppState::new(context));

    // Build router
    let app = Router::new()
        .route("/", get(routes::index::index))
        .route("/health", get(routes::health::health_check))
        .route("/predict", post(routes::predict::predict))
        .layer(DefaultBodyLimit::max(cli.max_upload_mb * 1024 * 1024))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
