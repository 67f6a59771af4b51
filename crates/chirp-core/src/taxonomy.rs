//! Taxonomy metadata store
//!
//! Optional per-species descriptive metadata (common name, scientific name,
//! whatever columns the source provides) keyed by the primary label. A
//! missing source file is a degraded mode, not an error: predictions are
//! still produced, just without metadata.

use std::collections::HashMap;
use std::path::Path;

use crate::classes::LABEL_COLUMN;
use crate::table::Table;

/// Metadata record for one species: column name -> value (None for empty cells)
pub type TaxonomyRecord = HashMap<String, Option<String>>;

/// Read-only mapping from label to taxonomy record
#[derive(Debug, Clone, Default)]
pub struct TaxonomyStore {
    /// Metadata columns, excluding the label column itself
    columns: Vec<String>,
    records: HashMap<String, TaxonomyRecord>,
}

impl TaxonomyStore {
    /// Load taxonomy metadata from a CSV file.
    ///
    /// Missing file, unreadable file, or a table without the label column all
    /// yield an empty store. The label column is used as the record key
    /// as-is; values are kept as strings for exact-match joins.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            log::info!("Taxonomy: {:?} doesn't exist, metadata disabled", path);
            return Self::default();
        }

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Taxonomy: failed to read {:?}: {}", path, e);
                return Self::default();
            }
        };

        let Some(table) = Table::parse(&text) else {
            return Self::default();
        };
        let Some(label_idx) = table.column_index(LABEL_COLUMN) else {
            log::warn!("Taxonomy: {:?} has no '{}' column", path, LABEL_COLUMN);
            return Self::default();
        };

        let columns: Vec<String> = table
            .columns
            .iter()
            .filter(|c| c.as_str() != LABEL_COLUMN)
            .cloned()
            .collect();

        let mut records = HashMap::with_capacity(table.rows.len());
        for row in &table.rows {
            let Some(label) = row.get(label_idx) else {
                continue;
            };
            let mut record = TaxonomyRecord::with_capacity(columns.len());
            for (idx, column) in table.columns.iter().enumerate() {
                if idx == label_idx {
                    continue;
                }
                let value = row.get(idx).filter(|v| !v.is_empty()).cloned();
                record.insert(column.clone(), value);
            }
            records.insert(label.clone(), record);
        }

        log::info!(
            "Taxonomy: {} records, {} metadata columns from {:?}",
            records.len(),
            columns.len(),
            path
        );
        Self { columns, records }
    }

    /// Metadata record for a label, if one exists
    pub fn record(&self, label: &str) -> Option<&TaxonomyRecord> {
        self.records.get(label)
    }

    /// All metadata column names (label column excluded)
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_taxonomy(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taxonomy.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let store = TaxonomyStore::load(Path::new("/nonexistent/taxonomy.csv"));
        assert!(store.is_empty());
        assert!(store.columns().is_empty());
    }

    #[test]
    fn test_load_records() {
        let (_dir, path) = write_taxonomy(
            "primary_label,common_name,scientific_name\n\
             amecro,American Crow,Corvus brachyrhynchos\n\
             norcar,Northern Cardinal,Cardinalis cardinalis\n",
        );
        let store = TaxonomyStore::load(&path);

        assert_eq!(store.len(), 2);
        assert_eq!(store.columns(), ["common_name", "scientific_name"]);
        let record = store.record("amecro").unwrap();
        assert_eq!(record["common_name"].as_deref(), Some("American Crow"));
        assert!(store.record("unknown").is_none());
    }

    #[test]
    fn test_empty_cells_become_none() {
        let (_dir, path) = write_taxonomy("primary_label,common_name\namecro,\n");
        let store = TaxonomyStore::load(&path);
        let record = store.record("amecro").unwrap();
        assert_eq!(record["common_name"], None);
    }

    #[test]
    fn test_missing_label_column_is_empty() {
        let (_dir, path) = write_taxonomy("species,common_name\nx,y\n");
        let store = TaxonomyStore::load(&path);
        assert!(store.is_empty());
    }
}
