//! Fixed-shape fitting for spectrogram images
//!
//! Three order-sensitive stages: zero-pad the time axis on the right, crop
//! the time axis to the leading columns, then bilinear-resample the
//! frequency axis if it does not already match. Reordering these changes
//! the output values, so they stay separate and explicit.

use ndarray::Array2;

/// Pad (right, with zeros) or crop the time axis so width == `target_width`
pub fn fit_time_axis(spec: &Array2<f32>, target_width: usize) -> Array2<f32> {
    let (height, width) = spec.dim();

    let mut out = Array2::<f32>::zeros((height, target_width));
    let copy_width = width.min(target_width);
    for row in 0..height {
        for col in 0..copy_width {
            out[[row, col]] = spec[[row, col]];
        }
    }
    out
}

/// Bilinear resize of the frequency (row) axis to `target_height`,
/// preserving width. Uses half-pixel centers (align_corners = false).
pub fn resize_height_bilinear(spec: &Array2<f32>, target_height: usize) -> Array2<f32> {
    let (height, width) = spec.dim();
    if height == target_height {
        return spec.clone();
    }

    let scale = height as f32 / target_height as f32;
    let mut out = Array2::<f32>::zeros((target_height, width));

    for dst_row in 0..target_height {
        let src = ((dst_row as f32 + 0.5) * scale - 0.5).max(0.0);
        let row0 = (src as usize).min(height - 1);
        let row1 = (row0 + 1).min(height - 1);
        let frac = src - row0 as f32;

        for col in 0..width {
            out[[dst_row, col]] =
                spec[[row0, col]] * (1.0 - frac) + spec[[row1, col]] * frac;
        }
    }
    out
}
