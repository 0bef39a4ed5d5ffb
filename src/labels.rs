//! Disease labels
//!
//! Labels have the form `"<plant>___<disease>"`, e.g.
//! `"Corn_(maize)___Northern_Leaf_Blight"` or `"Apple___healthy"`.
//! A [`LabelSet`] is the ordered list backing the classifier's output layer.

use crate::utils::error::{LeafCamError, Result};

/// Separator between plant and disease in a label
pub const LABEL_SEPARATOR: &str = "___";

/// Disease name reported when a label has no separator
pub const UNKNOWN_DISEASE: &str = "unknown";

/// Ordered label set; index `i` names classifier output `i`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label for a class index
    pub fn get(&self, index: usize) -> Result<&str> {
        self.labels
            .get(index)
            .map(String::as_str)
            .ok_or(LeafCamError::UnknownLabel {
                index,
                len: self.labels.len(),
            })
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// Split a label into `(plant, disease)`.
///
/// The disease is the segment between the first and second separator; any
/// further segments are dropped.
pub fn split_label(label: &str) -> (&str, &str) {
    let mut segments = label.split(LABEL_SEPARATOR);
    match (segments.next(), segments.next()) {
        (Some(plant), Some(disease)) => (plant, disease),
        _ => (label, UNKNOWN_DISEASE),
    }
}
