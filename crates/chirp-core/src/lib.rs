//! chirp-core - Audio-to-prediction pipeline for species classification
//!
//! Converts a short audio clip into a fixed-size mel spectrogram image,
//! scores it with a pretrained ONNX classifier, and assembles a ranked,
//! taxonomy-enriched list of candidate species:
//!
//! 1. **ClassIndex**: deterministic label ordering that defines the model's
//!    output dimension (built once at startup).
//! 2. **FeatureExtractor**: decode -> mono 32kHz -> mel power spectrogram ->
//!    dB -> z-score -> fixed 224x224 tensor.
//! 3. **Scorer**: ONNX Runtime forward pass + softmax.
//! 4. **Top-k selection and result assembly** against taxonomy metadata.
//!
//! All shared state (class index, taxonomy, loaded model) is immutable after
//! construction; per-request work is independent and stateless.

pub mod audio;
pub mod classes;
pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod predict;
pub mod scorer;
mod table;
pub mod taxonomy;

pub use classes::ClassIndex;
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use model::ModelManager;
pub use predict::{Pipeline, PredictionOutput, PredictionRecord};
pub use scorer::{MismatchPolicy, OrtScorer, Scorer};
pub use taxonomy::TaxonomyStore;
