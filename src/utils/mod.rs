//! Utilities module for logging, error types, and formatting helpers
//!
//! This module provides:
//! - Structured logging with tracing
//! - The crate-wide error type
//! - Small formatting helpers for CLI and log output

pub mod error;
pub mod logging;

use std::time::Duration;

// Re-export main types for convenience
pub use error::{LeafCamError, Result};
pub use logging::{init_logging, LogConfig, LogLevel, StageTimer};

/// Format a latency in a human-readable way
pub fn format_latency(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros < 1_000 {
        format!("{}µs", micros)
    } else if micros < 1_000_000 {
        format!("{:.1}ms", micros as f64 / 1_000.0)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Format a percentage with a progress bar
pub fn format_progress_bar(progress: f64, width: usize) -> String {
    let progress = progress.clamp(0.0, 1.0);
    let filled = (progress * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);

    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(empty),
        progress * 100.0
    )
}
