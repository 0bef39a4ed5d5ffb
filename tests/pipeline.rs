//! End-to-end checks of the diagnosis pipeline on an untrained, narrow network

use std::io::{Cursor, Write};
use std::path::PathBuf;

use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use leafcam::{InferenceContext, LeafCamError, ServiceConfig};

const TREATMENTS: &str = r#"{
    "Apple___Apple_scab": { "treatments": ["Rake and destroy fallen leaves", "Apply captan at green tip"] },
    "Apple___healthy": { "treatments": [] },
    "Corn_(maize)___Northern_Leaf_Blight": { "treatments": ["Plant resistant hybrids"] },
    "Tomato___Late_blight": { "treatments": ["Remove infected plants", "Apply copper fungicide"] }
}"#;

fn write_treatments(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("treatment_data.json");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(TREATMENTS.as_bytes()).unwrap();
    path
}

fn config(treatment_data: PathBuf) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.treatment_data = treatment_data;
    config.weights = vec![PathBuf::from("/nonexistent/plant_disease_model.mpk")];
    config.model.width_multiplier = 0.35;
    config.model.dense_units = 32;
    config
}

fn png(image: RgbImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

#[test]
fn uniform_image_yields_valid_diagnosis() {
    let dir = tempfile::tempdir().unwrap();
    let context = InferenceContext::load(config(write_treatments(&dir))).unwrap();

    let bytes = png(RgbImage::from_pixel(224, 224, Rgb([90, 160, 70])));
    let analysis = context.analyze(&bytes).unwrap();

    assert!(context.labels().contains(&analysis.prediction.label));
    assert!((0.0..=100.0).contains(&analysis.prediction.confidence));

    let heatmap = analysis.heatmap.expect("Grad-CAM should succeed on a uniform image");
    assert_eq!(heatmap.dimensions(), (224, 224));
    assert!(heatmap.values().iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn diagnosis_overlay_is_png_at_input_size() {
    let dir = tempfile::tempdir().unwrap();
    let context = InferenceContext::load(config(write_treatments(&dir))).unwrap();

    let image = RgbImage::from_fn(300, 200, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 30]));
    let diagnosis = context.diagnose(&png(image)).unwrap();

    let encoded = diagnosis.heatmap.expect("overlay should be attached");
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
    let overlay = image::load_from_memory(&bytes).unwrap();
    assert_eq!((overlay.width(), overlay.height()), (224, 224));
}

#[test]
fn missing_tap_layer_keeps_classification() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(write_treatments(&dir));
    config.tap_layer = "Conv_99".to_string();
    let context = InferenceContext::load(config).unwrap();

    let diagnosis = context
        .diagnose(&png(RgbImage::from_pixel(224, 224, Rgb([120, 80, 40]))))
        .unwrap();

    assert!(diagnosis.heatmap.is_none());
    assert!(!diagnosis.plant.is_empty());
    assert!(!diagnosis.disease.is_empty());
    assert!((0.0..=100.0).contains(&diagnosis.confidence));
    assert!(!context.status().tap_layer_found);
}

#[test]
fn corrupt_upload_is_client_error() {
    let dir = tempfile::tempdir().unwrap();
    let context = InferenceContext::load(config(write_treatments(&dir))).unwrap();

    let err = context.diagnose(b"GIF89a truncated").unwrap_err();

    assert!(matches!(err, LeafCamError::InvalidImage(_)));
    assert!(err.is_client_error());
}

#[test]
fn missing_weights_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let context = InferenceContext::load(config(write_treatments(&dir))).unwrap();

    let status = context.status();

    assert!(status.model_loaded);
    assert!(!status.weights_loaded);
    assert_eq!(status.num_classes, 4);
    assert_eq!(status.base_model_type, "MobileNetV2");
}

#[test]
fn missing_treatment_table_is_fatal() {
    let config = config(PathBuf::from("/nonexistent/treatment_data.json"));

    assert!(matches!(
        InferenceContext::load(config),
        Err(LeafCamError::PathNotFound(_))
    ));
}

#[test]
fn empty_treatment_table_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("treatment_data.json");
    std::fs::write(&path, "{}").unwrap();

    assert!(matches!(
        InferenceContext::load(config(path)),
        Err(LeafCamError::TreatmentData(_))
    ));
}
