//! Pipeline error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading the model or serving a prediction
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("Model download failed: {0}")]
    ModelDownloadFailed(String),

    #[error("Model output has {actual} classes, class index has {expected}")]
    ClassCountMismatch { expected: usize, actual: usize },

    #[error("Failed to read audio file: {path}")]
    AudioReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio clip decoded to zero samples")]
    EmptyAudio,

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
