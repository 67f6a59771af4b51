//! Feature extraction: raw audio bytes to a fixed-shape normalized tensor
//!
//! Deterministic transform with no hidden state: decode to mono at the
//! target rate, mel power spectrogram, dB scale referenced to the clip's
//! own maximum, z-score normalization, then fit to an exact
//! `spec_size x spec_size` image. Output shape is fixed regardless of
//! input duration.

mod mel;
mod shape;

pub use mel::{mel_filterbank, mel_spectrogram, SpectrumPipeline};
pub use shape::{fit_time_axis, resize_height_bilinear};

use std::path::Path;

use ndarray::{Array2, Array4};

use crate::audio;
use crate::config::SignalConfig;
use crate::error::Result;

/// Floor for dB conversion, and the dynamic range kept below the clip peak
const AMIN: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

/// Epsilon guarding the z-score divide on near-silent clips
const NORM_EPSILON: f32 = 1e-6;

/// An extracted model input plus the waveform stats the caller reports back
#[derive(Debug)]
pub struct Features {
    /// Shape (1, 1, spec_size, spec_size)
    pub tensor: Array4<f32>,
    /// Sample rate the waveform was resampled to
    pub sample_rate: u32,
    /// Number of mono samples after resampling
    pub num_samples: usize,
}

/// Extract features from an audio file on disk
pub fn extract(path: &Path, cfg: &SignalConfig) -> Result<Features> {
    let decoded = audio::decode_to_mono(path, cfg.sample_rate)?;
    let tensor = extract_from_samples(&decoded.samples, cfg);
    Ok(Features {
        tensor,
        sample_rate: decoded.sample_rate,
        num_samples: decoded.num_samples(),
    })
}

/// Extract features from an already-decoded mono waveform.
///
/// Infallible: any waveform, including empty or all-zero, produces a valid
/// tensor of the configured shape.
pub fn extract_from_samples(samples: &[f32], cfg: &SignalConfig) -> Array4<f32> {
    let mel = mel_spectrogram(samples, cfg);
    let mut spec = to_db(&mel);
    normalize_in_place(&mut spec);

    let spec = fit_time_axis(&spec, cfg.spec_size);
    let spec = resize_height_bilinear(&spec, cfg.spec_size);

    let (height, width) = spec.dim();
    spec.into_shape_with_order((1, 1, height, width))
        .expect("4-D reshape of a 2-D spectrogram cannot fail")
}

/// Power to dB referenced to the clip maximum, floored at `max - TOP_DB`
fn to_db(mel: &[Vec<f32>]) -> Array2<f32> {
    let n_bands = mel.len();
    let n_frames = mel.first().map_or(0, Vec::len);

    let peak = mel
        .iter()
        .flatten()
        .fold(0.0f32, |acc, &v| acc.max(v))
        .max(AMIN);
    let ref_db = 10.0 * peak.log10();

    let mut out = Array2::<f32>::zeros((n_bands, n_frames));
    for (band, row) in mel.iter().enumerate() {
        for (frame, &power) in row.iter().enumerate() {
            out[[band, frame]] = 10.0 * power.max(AMIN).log10() - ref_db;
        }
    }

    // Clamp dynamic range relative to the peak (now at 0 dB)
    let floor = -TOP_DB;
    out.mapv_inplace(|v| v.max(floor));
    out
}

/// Z-score normalization: subtract mean, divide by (std + epsilon)
fn normalize_in_place(spec: &mut Array2<f32>) {
    let n = spec.len();
    if n == 0 {
        return;
    }
    let mean = spec.sum() / n as f32;
    let var = spec.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n as f32;
    let denom = var.sqrt() + NORM_EPSILON;
    spec.mapv_inplace(|v| (v - mean) / denom);
}
