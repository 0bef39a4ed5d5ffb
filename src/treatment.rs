//! Treatment table
//!
//! Static mapping from disease label to treatment advice, read once at startup:
//!
//! ```json
//! {
//!   "Tomato___Late_blight": { "treatments": ["Remove infected leaves", "..."] },
//!   "Tomato___healthy": { "treatments": [] }
//! }
//! ```
//!
//! The table also fixes the label set: its sorted keys size the classifier
//! output and map predicted indices back to labels.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::labels::LabelSet;
use crate::utils::error::{LeafCamError, Result};

/// Advice recorded for one label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreatmentEntry {
    #[serde(default)]
    pub treatments: Vec<String>,
}

/// Label → treatment mapping, iterated in sorted label order
#[derive(Debug, Clone, Default)]
pub struct TreatmentTable {
    entries: BTreeMap<String, TreatmentEntry>,
}

impl TreatmentTable {
    /// Load the table from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LeafCamError::PathNotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
            .map_err(|e| LeafCamError::TreatmentData(format!("{}: {}", path.display(), e)))
    }

    /// Parse the table from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: BTreeMap<String, TreatmentEntry> = serde_json::from_str(json)?;
        Self::from_entries(entries)
    }

    /// Build the table from label/entry pairs
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, TreatmentEntry)>,
        S: Into<String>,
    {
        let entries: BTreeMap<String, TreatmentEntry> = entries
            .into_iter()
            .map(|(label, entry)| (label.into(), entry))
            .collect();

        if entries.is_empty() {
            return Err(LeafCamError::TreatmentData(
                "treatment table has no labels".to_string(),
            ));
        }

        Ok(Self { entries })
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The label set, in sorted order
    pub fn label_set(&self) -> LabelSet {
        LabelSet::new(self.entries.keys().cloned().collect())
    }

    /// Treatments for a label; empty when the label is unknown
    pub fn treatments(&self, label: &str) -> &[String] {
        self.entries
            .get(label)
            .map(|entry| entry.treatments.as_slice())
            .unwrap_or(&[])
    }
}
