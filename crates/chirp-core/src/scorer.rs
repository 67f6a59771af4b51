//! Model scoring via ONNX Runtime
//!
//! The classifier is an opaque scorer: fixed-shape tensor in, class
//! probability vector out. The `Scorer` trait abstracts the model so the
//! pipeline can be exercised without weights on disk; `OrtScorer` is the
//! production implementation.
//!
//! The model's output dimension is defined by the checkpoint, not by this
//! process, and can drift from the class index across model versions. That
//! drift is handled by an explicit `MismatchPolicy` instead of failing or
//! silently misaligning: lenient mode logs the discrepancy and realigns the
//! probability vector, strict mode rejects it.

use std::path::Path;

use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// What to do when the model's class dimension disagrees with the class index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Log the mismatch and truncate or zero-pad the probability vector so
    /// the index-to-label mapping stays aligned. Accuracy may be degraded,
    /// but the degradation is reported.
    #[default]
    Lenient,

    /// Treat any class-count mismatch as an error
    Strict,
}

/// Tensor-in, probability-vector-out scoring contract
pub trait Scorer: Send {
    /// Score one input tensor. Returns a probability vector of length
    /// `num_classes` summing to ~1 (lenient realignment may lose mass when
    /// the model emits more classes than the index).
    fn score(&mut self, input: Array4<f32>) -> Result<Vec<f32>>;

    /// Number of classes this scorer is aligned to (= class index length)
    fn num_classes(&self) -> usize;

    /// Scorer name for logging
    fn name(&self) -> &'static str;
}

/// ONNX Runtime scorer
#[derive(Debug)]
pub struct OrtScorer {
    session: Session,
    input_name: String,
    num_classes: usize,
    policy: MismatchPolicy,
    mismatch_logged: bool,
}

impl OrtScorer {
    /// Load the ONNX model from disk.
    ///
    /// A missing weights file is fatal: the process cannot serve without it.
    pub fn load(
        model_path: &Path,
        input_name: &str,
        num_classes: usize,
        policy: MismatchPolicy,
    ) -> Result<Self> {
        if !model_path.exists() {
            return Err(PipelineError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        log::info!("Loading ONNX model from {:?}", model_path);
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| PipelineError::ModelLoadFailed(e.to_string()))?;
        log::info!("Model loaded, expecting {} classes", num_classes);

        Ok(Self {
            session,
            input_name: input_name.to_string(),
            num_classes,
            policy,
            mismatch_logged: false,
        })
    }

    /// Realign a probability vector whose length disagrees with the index
    fn align(&mut self, mut probs: Vec<f32>) -> Result<Vec<f32>> {
        if probs.len() == self.num_classes {
            return Ok(probs);
        }

        match self.policy {
            MismatchPolicy::Strict => Err(PipelineError::ClassCountMismatch {
                expected: self.num_classes,
                actual: probs.len(),
            }),
            MismatchPolicy::Lenient => {
                if !self.mismatch_logged {
                    log::warn!(
                        "Model emits {} classes but class index has {}; realigning \
                         (predictions may be degraded)",
                        probs.len(),
                        self.num_classes
                    );
                    self.mismatch_logged = true;
                }
                probs.resize(self.num_classes, 0.0);
                Ok(probs)
            }
        }
    }
}

impl Scorer for OrtScorer {
    fn score(&mut self, input: Array4<f32>) -> Result<Vec<f32>> {
        let input_tensor = Tensor::from_array(input)
            .map_err(|e| PipelineError::InferenceFailed(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| PipelineError::InferenceFailed(e.to_string()))?;

        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| PipelineError::InferenceFailed("Model produced no output".into()))?;

        let (_shape, logits) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::InferenceFailed(e.to_string()))?;

        if logits.is_empty() {
            return Err(PipelineError::InferenceFailed(
                "Model produced an empty logit vector".into(),
            ));
        }

        let probs = softmax(logits);
        drop(outputs);
        self.align(probs)
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn name(&self) -> &'static str {
        "ONNX Runtime"
    }
}

/// Numerically stable softmax over a flat logit vector
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0, -1.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_softmax_orders_by_logit() {
        let probs = softmax(&[0.5, 3.0, -2.0]);
        assert!(probs[1] > probs[0]);
        assert!(probs[0] > probs[2]);
    }

    #[test]
    fn test_softmax_handles_large_logits() {
        // Stable against overflow thanks to the max shift
        let probs = softmax(&[1000.0, 999.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_softmax_uniform_on_equal_logits() {
        let probs = softmax(&[0.0; 8]);
        assert!(probs.iter().all(|&p| (p - 0.125).abs() < 1e-6));
    }

    #[test]
    fn test_load_missing_model_fails() {
        let err = OrtScorer::load(
            Path::new("/nonexistent/model.onnx"),
            "input",
            264,
            MismatchPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ModelNotFound(_)));
    }
}
