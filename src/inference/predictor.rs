//! Prediction results
//!
//! Turns a probability vector into a labelled prediction: argmax class,
//! plant/disease split, and confidence as a percentage with two decimals.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::labels::{split_label, LabelSet};
use crate::utils::error::{LeafCamError, Result};
use crate::utils::format_progress_bar;

/// Number of runner-up classes kept alongside the prediction
pub const TOP_K: usize = 5;

/// A class with its probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub class_index: usize,
    pub label: String,
    pub probability: f32,
}

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted class index
    pub class_index: usize,

    /// Full label, `<plant>___<disease>`
    pub label: String,

    pub plant: String,
    pub disease: String,

    /// Softmax probability of the predicted class
    pub probability: f32,

    /// Probability × 100, rounded to two decimals
    pub confidence: f64,

    /// Highest-probability classes, best first
    pub top_k: Vec<ClassProbability>,

    /// Forward pass time in milliseconds
    pub inference_time_ms: f64,
}

/// Index and value of the largest finite probability; ties go to the lowest index
pub fn argmax(probabilities: &[f32]) -> Option<(usize, f32)> {
    probabilities
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, p)| p.is_finite())
        .fold(None, |best, (idx, p)| match best {
            Some((_, top)) if p <= top => best,
            _ => Some((idx, p)),
        })
}

/// Convert a probability to a percentage in [0, 100] rounded to two decimals
pub fn confidence_percent(probability: f32) -> f64 {
    let percent = (probability as f64 * 100.0).clamp(0.0, 100.0);
    (percent * 100.0).round() / 100.0
}

impl Prediction {
    /// Build a prediction from a probability vector over `labels`
    pub fn from_probabilities(
        probabilities: &[f32],
        labels: &LabelSet,
        inference_time: Duration,
    ) -> Result<Self> {
        if probabilities.len() != labels.len() {
            return Err(LeafCamError::Model(format!(
                "classifier produced {} outputs for {} labels",
                probabilities.len(),
                labels.len()
            )));
        }

        let (class_index, probability) = argmax(probabilities).ok_or_else(|| {
            LeafCamError::Model("classifier produced no finite probabilities".to_string())
        })?;

        let label = labels.get(class_index)?.to_string();
        let (plant, disease) = split_label(&label);

        let mut ranked: Vec<(usize, f32)> = probabilities
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| p.is_finite())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let top_k = ranked
            .into_iter()
            .take(TOP_K)
            .map(|(idx, p)| {
                Ok(ClassProbability {
                    class_index: idx,
                    label: labels.get(idx)?.to_string(),
                    probability: p,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            class_index,
            plant: plant.to_string(),
            disease: disease.to_string(),
            label,
            probability,
            confidence: confidence_percent(probability),
            top_k,
            inference_time_ms: inference_time.as_secs_f64() * 1000.0,
        })
    }

    /// Pretty print the prediction result
    pub fn display(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Plant:      {}\n", self.plant));
        output.push_str(&format!("Disease:    {}\n", self.disease));
        output.push_str(&format!("Confidence: {:.2}%\n", self.confidence));
        output.push_str(&format!("Inference:  {:.2} ms\n", self.inference_time_ms));

        output.push_str(&format!("\nTop-{} predictions:\n", self.top_k.len()));
        for (i, class) in self.top_k.iter().enumerate() {
            output.push_str(&format!(
                "  {}. {:<45} {}\n",
                i + 1,
                class.label,
                format_progress_bar(class.probability as f64, 20)
            ));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> LabelSet {
        LabelSet::new((0..n).map(|i| format!("Plant{}___Disease{}", i, i)).collect())
    }

    #[test]
    fn test_prediction_from_probabilities() {
        let mut probs = vec![0.0; 8];
        probs[5] = 0.8;
        probs[2] = 0.15;
        probs[3] = 0.05;

        let prediction =
            Prediction::from_probabilities(&probs, &labels(8), Duration::from_millis(40)).unwrap();

        assert_eq!(prediction.class_index, 5);
        assert_eq!(prediction.label, "Plant5___Disease5");
        assert_eq!(prediction.plant, "Plant5");
        assert_eq!(prediction.disease, "Disease5");
        assert_eq!(prediction.confidence, 80.0);
        assert_eq!(prediction.top_k.len(), TOP_K);
        assert_eq!(prediction.top_k[0].class_index, 5);
        assert_eq!(prediction.top_k[1].class_index, 2);
        assert!((prediction.inference_time_ms - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_rounding() {
        assert_eq!(confidence_percent(0.123456), 12.35);
        assert_eq!(confidence_percent(1.0), 100.0);
        assert_eq!(confidence_percent(0.0), 0.0);
        assert_eq!(confidence_percent(1.0000002), 100.0);
    }

    #[test]
    fn test_argmax_ignores_nan() {
        assert_eq!(argmax(&[0.2, f32::NAN, 0.7, 0.1]), Some((2, 0.7)));
        assert_eq!(argmax(&[f32::NAN]), None);
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_argmax_tie_keeps_first_index() {
        assert_eq!(argmax(&[0.5, 0.5]), Some((0, 0.5)));
        assert_eq!(argmax(&[0.1, 0.45, 0.45]), Some((1, 0.45)));
    }

    #[test]
    fn test_tied_prediction_agrees_with_top_k() {
        let labels = LabelSet::new(vec!["A___x".to_string(), "B___y".to_string()]);

        let prediction =
            Prediction::from_probabilities(&[0.5, 0.5], &labels, Duration::ZERO).unwrap();

        assert_eq!(prediction.class_index, 0);
        assert_eq!(prediction.label, "A___x");
        assert_eq!(prediction.top_k[0].class_index, prediction.class_index);
    }

    #[test]
    fn test_output_width_mismatch() {
        let err = Prediction::from_probabilities(&[0.5, 0.5], &labels(3), Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, LeafCamError::Model(_)));
    }

    #[test]
    fn test_small_label_set_top_k() {
        let prediction =
            Prediction::from_probabilities(&[0.3, 0.7], &labels(2), Duration::ZERO).unwrap();

        assert_eq!(prediction.top_k.len(), 2);
        assert_eq!(prediction.class_index, 1);
    }

    #[test]
    fn test_display() {
        let prediction =
            Prediction::from_probabilities(&[0.25, 0.75], &labels(2), Duration::ZERO).unwrap();
        let text = prediction.display();

        assert!(text.contains("Plant1"));
        assert!(text.contains("75.00%"));
    }
}
