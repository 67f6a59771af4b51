//! Mel power spectrogram
//!
//! Centered STFT (reflect padding, periodic Hann window) over the mono
//! waveform, followed by a Slaney-scale mel filterbank. Matches the feature
//! transform the classifier was trained against, so the constants and the
//! mel variant here are part of the model contract.

use realfft::RealFftPlanner;

use crate::config::SignalConfig;

/// Windowed real FFT producing power spectra, with pre-allocated buffers
pub struct SpectrumPipeline {
    fft_size: usize,
    input_buf: Vec<f32>,
    spectrum_buf: Vec<realfft::num_complex::Complex<f32>>,
    scratch: Vec<realfft::num_complex::Complex<f32>>,
    plan: std::sync::Arc<dyn realfft::RealToComplex<f32>>,
    /// Periodic Hann window coefficients
    window: Vec<f32>,
}

impl SpectrumPipeline {
    pub fn new(size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);

        let input_buf = plan.make_input_vec();
        let spectrum_buf = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        let window: Vec<f32> = (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
            .collect();

        Self {
            fft_size: size,
            input_buf,
            spectrum_buf,
            scratch,
            plan,
            window,
        }
    }

    /// Power spectrum `|X|^2` of one windowed frame (N/2+1 bins)
    pub fn power(&mut self, frame: &[f32]) -> Vec<f32> {
        let n = self.fft_size.min(frame.len());

        for (i, slot) in self.input_buf.iter_mut().enumerate() {
            *slot = if i < n { frame[i] * self.window[i] } else { 0.0 };
        }

        if self
            .plan
            .process_with_scratch(&mut self.input_buf, &mut self.spectrum_buf, &mut self.scratch)
            .is_err()
        {
            return vec![0.0; self.spectrum_buf.len()];
        }

        self.spectrum_buf
            .iter()
            .map(|c| c.re * c.re + c.im * c.im)
            .collect()
    }

    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }
}

/// Compute the mel power spectrogram as `n_mels` rows x `n_frames` columns,
/// frequency on the row axis, time on the column axis.
///
/// The waveform is reflect-padded by `n_fft/2` on both ends so frames are
/// centered on their timestamps; frame count is `1 + len/hop`.
pub fn mel_spectrogram(samples: &[f32], cfg: &SignalConfig) -> Vec<Vec<f32>> {
    let padded = reflect_pad(samples, cfg.n_fft / 2);
    let n_frames = 1 + samples.len() / cfg.hop_length;

    let mut pipeline = SpectrumPipeline::new(cfg.n_fft);
    let filterbank = mel_filterbank(cfg.n_mels, cfg.n_fft, cfg.sample_rate as f32);

    let mut mel = vec![vec![0.0f32; n_frames]; cfg.n_mels];
    for frame_idx in 0..n_frames {
        let start = frame_idx * cfg.hop_length;
        let end = (start + cfg.n_fft).min(padded.len());
        let power = pipeline.power(&padded[start..end]);

        for (band_idx, filter) in filterbank.iter().enumerate() {
            let mut energy = 0.0f32;
            for &(bin, coeff) in filter {
                energy += coeff * power[bin];
            }
            mel[band_idx][frame_idx] = energy;
        }
    }

    mel
}

/// Reflect-pad a signal by `pad` samples on both ends.
///
/// Signals shorter than the pad reflect repeatedly (ping-pong indexing), so
/// even one-sample clips produce a full window.
fn reflect_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    let n = samples.len();
    if n == 0 {
        return vec![0.0; 2 * pad];
    }
    let mut padded = Vec::with_capacity(n + 2 * pad);
    let reflect = |i: isize| -> f32 {
        if n == 1 {
            return samples[0];
        }
        let period = 2 * (n as isize - 1);
        let mut j = i.rem_euclid(period);
        if j >= n as isize {
            j = period - j;
        }
        samples[j as usize]
    };
    for i in -(pad as isize)..(n as isize + pad as isize) {
        padded.push(reflect(i));
    }
    padded
}

/// Sparse triangular mel filterbank: per band, (fft bin, weight) pairs.
///
/// Slaney scale (linear below 1 kHz, logarithmic above) with Slaney area
/// normalization, fmin = 0, fmax = Nyquist.
pub fn mel_filterbank(n_mels: usize, n_fft: usize, sample_rate: f32) -> Vec<Vec<(usize, f32)>> {
    let n_bins = n_fft / 2 + 1;
    let fmax = sample_rate / 2.0;

    // Band edge frequencies: n_mels + 2 points evenly spaced on the mel scale
    let mel_min = hz_to_mel(0.0);
    let mel_max = hz_to_mel(fmax);
    let n_points = n_mels + 2;
    let hz_points: Vec<f32> = (0..n_points)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_points - 1) as f32))
        .collect();

    // Center frequency of each FFT bin
    let bin_hz = |bin: usize| bin as f32 * sample_rate / n_fft as f32;

    let mut filterbank = Vec::with_capacity(n_mels);
    for band in 0..n_mels {
        let left = hz_points[band];
        let center = hz_points[band + 1];
        let right = hz_points[band + 2];
        // Slaney normalization: constant per-band area
        let enorm = 2.0 / (right - left);

        let mut filter = Vec::new();
        for bin in 0..n_bins {
            let f = bin_hz(bin);
            let weight = if f >= left && f <= center && center > left {
                (f - left) / (center - left)
            } else if f > center && f <= right && right > center {
                (right - f) / (right - center)
            } else {
                continue;
            };
            if weight > 0.0 {
                filter.push((bin, weight * enorm));
            }
        }
        filterbank.push(filter);
    }

    filterbank
}

/// Hz to mel, Slaney variant
fn hz_to_mel(hz: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;
    if hz < MIN_LOG_HZ {
        hz / F_SP
    } else {
        let logstep = (6.4f32).ln() / 27.0;
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / logstep
    }
}

/// Mel to Hz, Slaney variant
fn mel_to_hz(mel: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;
    if mel < MIN_LOG_MEL {
        mel * F_SP
    } else {
        let logstep = (6.4f32).ln() / 27.0;
        MIN_LOG_HZ * ((mel - MIN_LOG_MEL) * logstep).exp()
    }
}
