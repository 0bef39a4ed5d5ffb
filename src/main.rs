//! LeafCam CLI
//!
//! Diagnose leaf photos from the command line and inspect the backbone
//! layers available as Grad-CAM tap points.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use leafcam::backend::{backend_name, default_device, DefaultBackend};
use leafcam::explain::overlay::{blend, colorize};
use leafcam::model::{MobileNetV2, MobileNetV2Config, HEAD_LAYERS};
use leafcam::utils::logging::{init_logging, LogConfig};
use leafcam::{InferenceContext, ServiceConfig};

/// Plant disease diagnosis with Grad-CAM explanations
#[derive(Parser, Debug)]
#[command(name = "leafcam")]
#[command(version)]
#[command(about = "Plant disease classification with Grad-CAM heatmaps", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// JSON service configuration (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Diagnose a single image or every image in a directory
    Infer {
        /// Path to input image or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Treatment table JSON (defines the label set)
        #[arg(short, long)]
        treatments: Option<PathBuf>,

        /// Checkpoint to load; may be repeated, first readable wins
        #[arg(short, long)]
        weights: Vec<PathBuf>,

        /// Backbone layer to tap for Grad-CAM
        #[arg(long)]
        tap_layer: Option<String>,

        /// Heatmap weight in the overlay (0.0-1.0)
        #[arg(long)]
        alpha: Option<f32>,

        /// Directory to write `<name>_gradcam.png` overlays into
        #[arg(short, long)]
        overlay_dir: Option<PathBuf>,
    },

    /// List backbone layers usable as Grad-CAM tap points, then the head
    Layers,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };

    let _ = init_logging(&log_config);

    let config = match &cli.config {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => ServiceConfig::default(),
    };

    match cli.command {
        Commands::Infer {
            input,
            treatments,
            weights,
            tap_layer,
            alpha,
            overlay_dir,
        } => {
            let mut config = config;
            if let Some(treatments) = treatments {
                config.treatment_data = treatments;
            }
            if !weights.is_empty() {
                config.weights = weights;
            }
            if let Some(tap_layer) = tap_layer {
                config.tap_layer = tap_layer;
            }
            if let Some(alpha) = alpha {
                config.heatmap_alpha = alpha;
            }
            cmd_infer(config, &input, overlay_dir.as_deref())?;
        }

        Commands::Layers => {
            cmd_layers(&config)?;
        }
    }

    Ok(())
}

/// Image files directly inside `input`, or `input` itself
fn collect_images(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(input)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| ["jpg", "jpeg", "png"].contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

fn cmd_infer(config: ServiceConfig, input: &Path, overlay_dir: Option<&Path>) -> Result<()> {
    info!("Running inference on {:?}", input);

    println!("{}", "Inference Configuration:".cyan().bold());
    println!("  Input:      {}", input.display());
    println!("  Treatments: {}", config.treatment_data.display());
    println!("  Tap layer:  {}", config.tap_layer);
    println!("  Backend:    {}", backend_name());
    println!();

    if !input.exists() {
        anyhow::bail!("Input path not found: {}", input.display());
    }

    let alpha = config.heatmap_alpha;
    let context = InferenceContext::load(config).context("Failed to build inference context")?;
    if !context.weights().is_loaded() {
        println!(
            "{} no checkpoint loaded, predictions are unreliable",
            "Warning:".yellow().bold()
        );
    }

    if let Some(dir) = overlay_dir {
        std::fs::create_dir_all(dir)?;
    }

    for file_path in collect_images(input)? {
        let name = file_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let bytes = std::fs::read(&file_path)?;
        let analysis = match context.analyze(&bytes) {
            Ok(analysis) => analysis,
            Err(e) => {
                println!("{} {}: {}", "Skipped".red(), name, e);
                continue;
            }
        };

        println!("{}", name.bold());
        print!("{}", analysis.prediction.display());

        let treatments = context.treatments().treatments(&analysis.prediction.label);
        if treatments.is_empty() {
            println!("  {}", "No treatments recorded".dimmed());
        } else {
            println!("\nTreatments:");
            for treatment in treatments {
                println!("  - {}", treatment);
            }
        }

        match (&analysis.heatmap, overlay_dir) {
            (Some(heatmap), Some(dir)) => {
                let overlay = blend(&analysis.image, &colorize(heatmap), alpha)?;
                let stem = file_path
                    .file_stem()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string();
                let out = dir.join(format!("{}_gradcam.png", stem));
                overlay
                    .save(&out)
                    .with_context(|| format!("Failed to write {}", out.display()))?;
                println!("  Heatmap:    {}", out.display().to_string().green());
            }
            (None, _) => println!("  Heatmap:    {}", "unavailable".yellow()),
            _ => {}
        }
        println!();
    }

    Ok(())
}

fn cmd_layers(config: &ServiceConfig) -> Result<()> {
    let device = default_device();
    let backbone: MobileNetV2<DefaultBackend> = MobileNetV2Config::new()
        .with_width_multiplier(config.model.width_multiplier)
        .init(&device);

    println!("{}", "MobileNetV2 layers:".cyan().bold());
    for (i, name) in backbone.layer_names().iter().enumerate() {
        if *name == config.tap_layer {
            println!("  {:>2}. {} {}", i, name.green().bold(), "(tap)".green());
        } else {
            println!("  {:>2}. {}", i, name);
        }
    }

    println!("{}", "Head layers:".cyan().bold());
    for name in HEAD_LAYERS {
        println!("      {}", name.dimmed());
    }

    if backbone.position(&config.tap_layer).is_none() {
        println!(
            "\n{} tap layer '{}' is not a backbone layer",
            "Warning:".yellow().bold(),
            config.tap_layer
        );
    }

    Ok(())
}
