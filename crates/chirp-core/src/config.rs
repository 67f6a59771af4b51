//! Pipeline configuration
//!
//! Configuration is stored as YAML. All values have fixed defaults so the
//! pipeline is operable with no config file at all; the server binary layers
//! environment-variable overrides on top.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::scorer::MismatchPolicy;

/// Number of placeholder classes synthesized when neither a label source nor
/// a taxonomy source is available.
pub const FALLBACK_NUM_CLASSES: usize = 264;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Path to the ONNX classifier weights
    pub model_path: PathBuf,
    /// Optional URL to fetch the weights from when `model_path` is absent
    pub model_url: Option<String>,
    /// Name of the model's input tensor
    pub input_name: String,
    /// Primary label source: CSV with a `primary_label` column
    pub train_csv_path: PathBuf,
    /// Taxonomy metadata source: CSV keyed by `primary_label`
    pub taxonomy_csv_path: PathBuf,
    /// What to do when the model's output dimension disagrees with the
    /// class index length
    pub mismatch_policy: MismatchPolicy,
    /// Signal-processing constants
    pub signal: SignalConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model.onnx"),
            model_url: None,
            input_name: String::from("input"),
            train_csv_path: PathBuf::from("train.csv"),
            taxonomy_csv_path: PathBuf::from("taxonomy.csv"),
            mismatch_policy: MismatchPolicy::default(),
            signal: SignalConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate and clamp values to supported ranges
    pub fn validate(&mut self) {
        self.signal.validate();
    }
}

/// Signal-processing configuration
///
/// These constants define the feature transform the classifier was trained
/// against. Changing any of them without retraining desynchronizes the model
/// input distribution; they are configurable for experimentation only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Target sample rate the waveform is resampled to (Hz)
    pub sample_rate: u32,
    /// FFT window size in samples
    pub n_fft: usize,
    /// Hop length between analysis frames in samples
    pub hop_length: usize,
    /// Number of mel bands
    pub n_mels: usize,
    /// Output spectrogram image is spec_size x spec_size
    pub spec_size: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            sample_rate: 32_000,
            n_fft: 1024,
            hop_length: 320,
            n_mels: 224,
            spec_size: 224,
        }
    }
}

impl SignalConfig {
    /// Clamp values to ranges the transform can actually operate with
    pub fn validate(&mut self) {
        self.sample_rate = self.sample_rate.clamp(8_000, 192_000);
        self.n_fft = self.n_fft.clamp(64, 8192).next_power_of_two();
        self.hop_length = self.hop_length.clamp(1, self.n_fft);
        self.n_mels = self.n_mels.clamp(8, 1024);
        self.spec_size = self.spec_size.clamp(16, 2048);
    }
}

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config.
/// If the file exists but is invalid, logs a warning and returns default config.
pub fn load_config(path: &Path) -> PipelineConfig {
    if !path.exists() {
        log::info!("load_config: {:?} doesn't exist, using defaults", path);
        return PipelineConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<PipelineConfig>(&contents) {
            Ok(mut config) => {
                config.validate();
                log::info!("load_config: Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("load_config: Failed to parse config: {}, using defaults", e);
                PipelineConfig::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: Failed to read config file: {}, using defaults", e);
            PipelineConfig::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories as needed
pub fn save_config(config: &PipelineConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;
    Ok(())
}
