//! Audio decoding
//!
//! Decodes any Symphonia-supported container/codec to interleaved f32, then
//! mixes down to mono and resamples to the configured rate. Decoding is the
//! only per-request step that can fail on user input; everything downstream
//! operates on a plain sample buffer.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{PipelineError, Result};

/// A decoded clip: mono samples at the requested rate
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }
}

/// Decode an audio file to mono f32 at `target_sample_rate`
pub fn decode_to_mono(path: &Path, target_sample_rate: u32) -> Result<DecodedAudio> {
    let (interleaved, source_rate, channels) = decode_interleaved(path)?;
    if interleaved.is_empty() {
        return Err(PipelineError::EmptyAudio);
    }

    let mono = mix_down(&interleaved, channels);
    let samples = if source_rate == target_sample_rate {
        mono
    } else {
        resample_linear(&mono, source_rate as f32, target_sample_rate as f32)
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: target_sample_rate,
    })
}

/// Decode an audio file to interleaved f32 samples using Symphonia
fn decode_interleaved(path: &Path) -> Result<(Vec<f32>, u32, u16)> {
    let file = File::open(path).map_err(|e| PipelineError::AudioReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create a hint with the file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    // Probe the media source
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| PipelineError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    // Find the first audio track
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| PipelineError::UnsupportedFormat("No audio track found".to_string()))?;

    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| PipelineError::UnsupportedFormat("Unknown sample rate".to_string()))?;

    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PipelineError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    // Decode all packets
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Error decoding packet: {}", e);
                continue;
            }
        };

        // Initialize sample buffer on first decode
        if sample_buf.is_none() {
            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;
            sample_buf = Some(SampleBuffer::new(duration, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    Ok((samples, sample_rate, channels))
}

/// Average interleaved channels into a mono buffer
fn mix_down(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let channels = channels as usize;
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear interpolation resampling
fn resample_linear(samples: &[f32], from_sr: f32, to_sr: f32) -> Vec<f32> {
    let ratio = from_sr / to_sr;
    let output_len = (samples.len() as f32 / ratio) as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f32 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_down_stereo() {
        let interleaved = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        let mono = mix_down(&interleaved, 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_mix_down_mono_passthrough() {
        let samples = [0.1, 0.2, 0.3];
        assert_eq!(mix_down(&samples, 1), samples.to_vec());
    }

    #[test]
    fn test_resample_halves_length() {
        let samples = vec![0.0f32; 1000];
        let out = resample_linear(&samples, 32000.0, 16000.0);
        assert_eq!(out.len(), 500);
    }

    #[test]
    fn test_resample_preserves_constant_signal() {
        let samples = vec![0.7f32; 441];
        let out = resample_linear(&samples, 44100.0, 32000.0);
        assert!(out.iter().all(|&s| (s - 0.7).abs() < 1e-6));
    }

    #[test]
    fn test_decode_wav_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 32_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..32_000 {
            let t = i as f32 / 32_000.0;
            writer
                .write_sample((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5)
                .unwrap();
        }
        writer.finalize().unwrap();

        let decoded = decode_to_mono(&path, 32_000).unwrap();
        assert_eq!(decoded.sample_rate, 32_000);
        assert_eq!(decoded.num_samples(), 32_000);
        // Signal energy should survive the decode
        let rms: f32 =
            (decoded.samples.iter().map(|s| s * s).sum::<f32>() / decoded.samples.len() as f32).sqrt();
        assert!((rms - 0.5 / std::f32::consts::SQRT_2).abs() < 0.01, "rms = {}", rms);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"definitely not an mp3 file").unwrap();

        assert!(decode_to_mono(&path, 32_000).is_err());
    }

    #[test]
    fn test_decode_missing_file_fails() {
        let err = decode_to_mono(Path::new("/nonexistent/clip.ogg"), 32_000).unwrap_err();
        assert!(matches!(err, PipelineError::AudioReadError { .. }));
    }
}
