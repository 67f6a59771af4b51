//! Deterministic class index
//!
//! The ordered list of class labels defines the model's output dimension and
//! the index-to-label mapping. The ordering is a pure function of the label
//! data: dedupe, then sort by `(string length, lexicographic value)`. This
//! exact key was used when the classifier was trained, so it must never
//! change independently of the weights.

use std::collections::BTreeSet;
use std::path::Path;

use crate::config::FALLBACK_NUM_CLASSES;
use crate::table::Table;

/// Column holding the species label in both label sources
pub const LABEL_COLUMN: &str = "primary_label";

/// Immutable ordered mapping from class id to species label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassIndex {
    labels: Vec<String>,
}

impl ClassIndex {
    /// Build the class index from the available label sources.
    ///
    /// Preference order: the primary label source (observed labels), then the
    /// taxonomy source, then a numeric placeholder sequence. This function
    /// always produces a usable index; whether it matches the network's
    /// trained ordering is an external contract it cannot verify.
    pub fn build(train_csv: &Path, taxonomy_csv: &Path) -> Self {
        if let Some(index) = Self::from_csv(train_csv) {
            log::info!(
                "Class index: {} classes from label source {:?}",
                index.len(),
                train_csv
            );
            return index;
        }

        if let Some(index) = Self::from_csv(taxonomy_csv) {
            log::info!(
                "Class index: {} classes from taxonomy source {:?}",
                index.len(),
                taxonomy_csv
            );
            return index;
        }

        log::warn!(
            "Class index: no label source available, synthesizing {} numeric classes",
            FALLBACK_NUM_CLASSES
        );
        Self::numeric_fallback(FALLBACK_NUM_CLASSES)
    }

    /// Dedupe and order a set of observed labels
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = labels.into_iter().map(Into::into).collect();
        let mut labels: Vec<String> = unique.into_iter().collect();
        labels.sort_by(|a, b| (a.len(), a.as_str()).cmp(&(b.len(), b.as_str())));
        Self { labels }
    }

    /// Placeholder index of stringified integers `0..n`
    pub fn numeric_fallback(n: usize) -> Self {
        Self {
            labels: (0..n).map(|i| i.to_string()).collect(),
        }
    }

    fn from_csv(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Class index: failed to read {:?}: {}", path, e);
                return None;
            }
        };
        let table = Table::parse(&text)?;
        let values = table.column_values(LABEL_COLUMN)?;
        if values.is_empty() {
            return None;
        }
        Some(Self::from_labels(values))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label for a class id, if in range
    pub fn label(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}
