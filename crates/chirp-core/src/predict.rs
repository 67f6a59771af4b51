//! Prediction assembly: feature extraction, scoring, top-k selection, and
//! taxonomy enrichment behind one façade.

use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

use crate::classes::ClassIndex;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::features;
use crate::scorer::Scorer;
use crate::taxonomy::TaxonomyStore;

/// Bounds on the number of predictions a single request may ask for
pub const MIN_TOP_K: usize = 1;
pub const MAX_TOP_K: usize = 50;

/// Clamp a requested result count into the supported range
pub fn clamp_top_k(requested: i64) -> usize {
    requested.clamp(MIN_TOP_K as i64, MAX_TOP_K as i64) as usize
}

/// Pick the `k` highest-probability classes.
///
/// Returned pairs are (class index, probability), sorted by descending
/// probability with ties broken by ascending class index so equal scores
/// always rank in a stable order. Ascending-index ties are part of the
/// response contract; changing the direction reorders equal-score results
/// clients may have pinned.
pub fn select_top_k(probs: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = probs.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    ranked.truncate(k.min(probs.len()));
    ranked
}

/// One ranked prediction, enriched with taxonomy metadata
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRecord {
    #[serde(rename = "primary_label")]
    pub label: String,
    /// Raw model probability in [0, 1]
    pub confidence: f32,
    /// Probability as a percentage, rounded to two decimals
    pub confidence_pct: f64,
    /// Taxonomy columns for this label. Every known column is present on
    /// every record; unknown values are explicit nulls, never NaN.
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, Value>,
}

/// Full response for one scored clip
#[derive(Debug, Serialize)]
pub struct PredictionOutput {
    pub top_k: usize,
    pub sample_rate: u32,
    pub num_samples: usize,
    pub results: Vec<PredictionRecord>,
}

/// Resolve ranked (index, probability) pairs into labeled, enriched records
pub fn assemble(
    picks: &[(usize, f32)],
    class_index: &ClassIndex,
    taxonomy: &TaxonomyStore,
) -> Vec<PredictionRecord> {
    picks
        .iter()
        .map(|&(class_id, confidence)| {
            let label = match class_index.label(class_id) {
                Some(label) => label.to_string(),
                None => format!("class_{}", class_id),
            };

            let record = taxonomy.record(&label);
            let mut metadata = serde_json::Map::new();
            for column in taxonomy.columns() {
                let value = record
                    .and_then(|r| r.get(column))
                    .and_then(|cell| cell.as_deref())
                    .map(|s| Value::String(s.to_string()))
                    .unwrap_or(Value::Null);
                metadata.insert(column.clone(), value);
            }

            let confidence_pct = (confidence as f64 * 10_000.0).round() / 100.0;

            PredictionRecord {
                label,
                confidence,
                confidence_pct,
                metadata,
            }
        })
        .collect()
}

/// The full classification pipeline: class index, taxonomy, and scorer
/// assembled into one shareable unit.
///
/// The scorer mutates per call (ONNX Runtime sessions are not re-entrant),
/// so inference is serialized behind a mutex while feature extraction runs
/// unsynchronized.
pub struct Pipeline {
    config: PipelineConfig,
    class_index: ClassIndex,
    taxonomy: TaxonomyStore,
    scorer: Mutex<Box<dyn Scorer + Send>>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        class_index: ClassIndex,
        taxonomy: TaxonomyStore,
        scorer: Box<dyn Scorer + Send>,
    ) -> Self {
        Self {
            config,
            class_index,
            taxonomy,
            scorer: Mutex::new(scorer),
        }
    }

    pub fn num_classes(&self) -> usize {
        self.class_index.len()
    }

    pub fn class_index(&self) -> &ClassIndex {
        &self.class_index
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Score one audio file and return the `top_k` best labels.
    ///
    /// `top_k` must already be clamped via [`clamp_top_k`].
    pub fn predict(&self, path: &Path, top_k: usize) -> Result<PredictionOutput> {
        let features = features::extract(path, &self.config.signal)?;

        let probs = {
            let mut scorer = self
                .scorer
                .lock()
                .map_err(|_| PipelineError::InferenceFailed("Scorer lock poisoned".into()))?;
            scorer.score(features.tensor)?
        };

        let picks = select_top_k(&probs, top_k);
        let results = assemble(&picks, &self.class_index, &self.taxonomy);

        Ok(PredictionOutput {
            top_k,
            sample_rate: features.sample_rate,
            num_samples: features.num_samples,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalConfig;
    use crate::scorer::softmax;
    use ndarray::Array4;
    use std::io::Write;

    /// Scorer that ignores its input and returns a canned distribution
    struct StubScorer {
        probs: Vec<f32>,
    }

    impl Scorer for StubScorer {
        fn score(&mut self, _input: Array4<f32>) -> Result<Vec<f32>> {
            Ok(self.probs.clone())
        }

        fn num_classes(&self) -> usize {
            self.probs.len()
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    #[test]
    fn test_clamp_top_k() {
        assert_eq!(clamp_top_k(-3), 1);
        assert_eq!(clamp_top_k(0), 1);
        assert_eq!(clamp_top_k(5), 5);
        assert_eq!(clamp_top_k(50), 50);
        assert_eq!(clamp_top_k(9999), 50);
    }

    #[test]
    fn test_select_top_k_orders_descending() {
        let probs = vec![0.1, 0.5, 0.2, 0.15, 0.05];
        let picks = select_top_k(&probs, 3);
        assert_eq!(picks.len(), 3);
        assert_eq!(picks[0].0, 1);
        assert_eq!(picks[1].0, 2);
        assert_eq!(picks[2].0, 3);
    }

    #[test]
    fn test_select_top_k_ties_break_by_index() {
        let probs = vec![0.25, 0.25, 0.25, 0.25];
        let picks = select_top_k(&probs, 4);
        let indices: Vec<usize> = picks.iter().map(|p| p.0).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_select_top_k_no_duplicates() {
        let probs = softmax(&[3.0, 1.0, 2.0, 0.5, 0.1, 2.5]);
        let picks = select_top_k(&probs, 6);
        let mut indices: Vec<usize> = picks.iter().map(|p| p.0).collect();
        indices.sort_unstable();
        indices.dedup();
        assert_eq!(indices.len(), 6);
    }

    #[test]
    fn test_select_top_k_clamped_to_class_count() {
        let probs = vec![0.6, 0.4];
        let picks = select_top_k(&probs, 50);
        assert_eq!(picks.len(), 2);
    }

    #[test]
    fn test_assemble_falls_back_to_numeric_label() {
        let index = ClassIndex::from_labels(["wren", "robin"]);
        let taxonomy = TaxonomyStore::load(Path::new("/nonexistent/taxonomy.csv"));
        // Index 7 is beyond the class index
        let records = assemble(&[(7, 0.9)], &index, &taxonomy);
        assert_eq!(records[0].label, "class_7");
    }

    #[test]
    fn test_assemble_rounds_confidence_pct() {
        let index = ClassIndex::from_labels(["wren"]);
        let taxonomy = TaxonomyStore::load(Path::new("/nonexistent/taxonomy.csv"));
        let records = assemble(&[(0, 0.123456)], &index, &taxonomy);
        assert!((records[0].confidence_pct - 12.35).abs() < 1e-9);
    }

    #[test]
    fn test_assemble_emits_null_for_unknown_labels() {
        let dir = tempfile::tempdir().unwrap();
        let taxonomy_path = dir.path().join("taxonomy.csv");
        let mut f = std::fs::File::create(&taxonomy_path).unwrap();
        writeln!(f, "primary_label,common_name,scientific_name").unwrap();
        writeln!(f, "wren,House Wren,Troglodytes aedon").unwrap();
        drop(f);

        let index = ClassIndex::from_labels(["wren", "robin"]);
        let taxonomy = TaxonomyStore::load(&taxonomy_path);

        let records = assemble(&[(0, 0.7), (1, 0.3)], &index, &taxonomy);

        // "wren" sorts before "robin" by (length, lexicographic)
        assert_eq!(records[0].label, "wren");
        assert_eq!(
            records[0].metadata.get("common_name"),
            Some(&Value::String("House Wren".into()))
        );

        // "robin" has no taxonomy row; every column is an explicit null
        assert_eq!(records[1].label, "robin");
        assert_eq!(records[1].metadata.get("common_name"), Some(&Value::Null));
        assert_eq!(
            records[1].metadata.get("scientific_name"),
            Some(&Value::Null)
        );
    }

    #[test]
    fn test_record_serializes_flat_metadata() {
        let mut metadata = serde_json::Map::new();
        metadata.insert("common_name".into(), Value::String("House Wren".into()));
        let record = PredictionRecord {
            label: "wren".into(),
            confidence: 0.5,
            confidence_pct: 50.0,
            metadata,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["primary_label"], "wren");
        assert_eq!(json["common_name"], "House Wren");
        assert_eq!(json["confidence_pct"], 50.0);
    }

    #[test]
    fn test_pipeline_predict_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let wav_path = dir.path().join("clip.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 32_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&wav_path, spec).unwrap();
        for i in 0..32_000 {
            let t = i as f32 / 32_000.0;
            let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
            writer.write_sample((sample * i16::MAX as f32 * 0.5) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let index = ClassIndex::from_labels(["wren", "robin", "sparrow"]);
        let taxonomy = TaxonomyStore::load(Path::new("/nonexistent/taxonomy.csv"));
        let scorer = StubScorer {
            probs: softmax(&[1.0, 3.0, 2.0]),
        };

        let mut config = PipelineConfig::default();
        config.signal = SignalConfig::default();
        let pipeline = Pipeline::new(config, index, taxonomy, Box::new(scorer));

        let output = pipeline.predict(&wav_path, 2).unwrap();
        assert_eq!(output.top_k, 2);
        assert_eq!(output.sample_rate, 32_000);
        assert_eq!(output.num_samples, 32_000);
        assert_eq!(output.results.len(), 2);
        // Logit 3.0 belongs to the second label in (length, lex) order
        assert!(output.results[0].confidence > output.results[1].confidence);
    }

    #[test]
    fn test_pipeline_predict_silent_clip() {
        // An all-zero clip must still come back as k finite, ranked records
        let dir = tempfile::tempdir().unwrap();
        let wav_path = dir.path().join("silence.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 32_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&wav_path, spec).unwrap();
        for _ in 0..32_000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let index = ClassIndex::from_labels(["wren", "robin", "sparrow"]);
        let taxonomy = TaxonomyStore::load(Path::new("/nonexistent/taxonomy.csv"));
        let scorer = StubScorer {
            probs: softmax(&[1.0, 3.0, 2.0]),
        };
        let pipeline = Pipeline::new(
            PipelineConfig::default(),
            index,
            taxonomy,
            Box::new(scorer),
        );

        let output = pipeline.predict(&wav_path, 3).unwrap();
        assert_eq!(output.num_samples, 32_000);
        assert_eq!(output.results.len(), 3);
        for record in &output.results {
            assert!(record.confidence.is_finite());
            assert!(record.confidence_pct.is_finite());
            assert!(!record.label.is_empty());
        }
    }

    #[test]
    fn test_pipeline_predict_missing_file_errors() {
        let index = ClassIndex::numeric_fallback(4);
        let taxonomy = TaxonomyStore::load(Path::new("/nonexistent/taxonomy.csv"));
        let scorer = StubScorer {
            probs: vec![0.25; 4],
        };
        let pipeline = Pipeline::new(
            PipelineConfig::default(),
            index,
            taxonomy,
            Box::new(scorer),
        );
        assert!(pipeline.predict(Path::new("/nonexistent/clip.wav"), 1).is_err());
    }
}
