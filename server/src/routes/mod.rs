//! API route handlers

pub mod health;
pub mod index;
pub mod predict;

#[cfg(test)]
pub(crate) mod testing {
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::Arc;

    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use leafcam::{InferenceContext, ServiceConfig, TreatmentEntry, TreatmentTable};

    use crate::state::{AppState, SharedState};

    /// Small, untrained network over three labels
    pub fn state_with_tap(tap_layer: &str) -> SharedState {
        let mut config = ServiceConfig::default();
        config.model.image_size = 64;
        config.model.width_multiplier = 0.35;
        config.model.dense_units = 16;
        config.weights = vec![PathBuf::from("/nonexistent/leafcam.mpk")];
        config.tap_layer = tap_layer.to_string();

        let treatments = TreatmentTable::from_entries([
            (
                "Grape___Black_rot",
                TreatmentEntry {
                    treatments: vec!["Remove mummified berries".to_string()],
                },
            ),
            ("Grape___healthy", TreatmentEntry::default()),
            (
                "Potato___Early_blight",
                TreatmentEntry {
                    treatments: vec!["Rotate crops".to_string(), "Apply chlorothalonil".to_string()],
                },
            ),
        ])
        .unwrap();

        let context = InferenceContext::from_treatments(config, treatments).unwrap();
        Arc::new(AppState::new(context))
    }

    pub fn uniform_png(size: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(size, size, Rgb([60, 140, 50]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }
}
