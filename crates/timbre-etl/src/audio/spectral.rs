//! Mel-band spectral statistics embedding.
//!
//! The signal is cut into Hann-windowed frames, each frame's power spectrum
//! is folded into mel-spaced triangular bands, and the log band energies are
//! summarised over the whole track as a per-band mean followed by a per-band
//! standard deviation.

use anyhow::{anyhow, bail, Result};
use realfft::RealFftPlanner;

/// STFT frame length in samples.
pub const FRAME_SIZE: usize = 2048;

/// Distance between consecutive frames in samples.
pub const HOP_SIZE: usize = 1024;

const MIN_FREQ_HZ: f32 = 30.0;
const LOG_FLOOR: f32 = 1e-10;

/// Compute a `dim`-long embedding from mono samples.
///
/// `dim` must be even: the first half holds band means, the second half band
/// standard deviations.
pub fn spectral_embedding(samples: &[f32], sample_rate: u32, dim: usize) -> Result<Vec<f32>> {
    if dim < 2 || dim % 2 != 0 {
        bail!("embedding size must be an even number >= 2, got {dim}");
    }
    if samples.len() < FRAME_SIZE {
        bail!(
            "audio too short for analysis: {} samples, need at least {}",
            samples.len(),
            FRAME_SIZE
        );
    }

    let n_bands = dim / 2;
    let filterbank = mel_filterbank(n_bands, sample_rate);
    let window = hann_window(FRAME_SIZE);

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FRAME_SIZE);
    let mut frame = fft.make_input_vec();
    let mut spectrum = fft.make_output_vec();
    let mut power = vec![0.0f32; spectrum.len()];

    let mut sums = vec![0.0f64; n_bands];
    let mut sq_sums = vec![0.0f64; n_bands];
    let num_frames = (samples.len() - FRAME_SIZE) / HOP_SIZE + 1;

    for frame_idx in 0..num_frames {
        let start = frame_idx * HOP_SIZE;
        for (dst, (src, w)) in frame
            .iter_mut()
            .zip(samples[start..start + FRAME_SIZE].iter().zip(&window))
        {
            *dst = src * w;
        }

        fft.process(&mut frame, &mut spectrum)
            .map_err(|e| anyhow!("FFT failed: {:?}", e))?;

        for (p, c) in power.iter_mut().zip(&spectrum) {
            *p = c.norm_sqr();
        }

        for (band, weights) in filterbank.iter().enumerate() {
            let energy: f32 = weights.iter().map(|&(bin, w)| power[bin] * w).sum();
            let log_energy = f64::from((energy + LOG_FLOOR).ln());
            sums[band] += log_energy;
            sq_sums[band] += log_energy * log_energy;
        }
    }

    let n = num_frames as f64;
    let mut embedding = Vec::with_capacity(dim);
    embedding.extend(sums.iter().map(|s| (s / n) as f32));
    embedding.extend(sums.iter().zip(&sq_sums).map(|(s, sq)| {
        let mean = s / n;
        ((sq / n) - mean * mean).max(0.0).sqrt() as f32
    }));

    Ok(embedding)
}

fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / len as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Sparse triangular filters: for each band, the `(bin, weight)` pairs with
/// non-zero weight.
fn mel_filterbank(n_bands: usize, sample_rate: u32) -> Vec<Vec<(usize, f32)>> {
    let nyquist = sample_rate as f32 / 2.0;
    let n_bins = FRAME_SIZE / 2 + 1;
    let bin_hz = sample_rate as f32 / FRAME_SIZE as f32;

    let mel_lo = hz_to_mel(MIN_FREQ_HZ);
    let mel_hi = hz_to_mel(nyquist);
    let step = (mel_hi - mel_lo) / (n_bands + 1) as f32;
    let edges: Vec<f32> = (0..n_bands + 2)
        .map(|i| mel_to_hz(mel_lo + step * i as f32))
        .collect();

    edges
        .windows(3)
        .map(|tri| {
            let (lo, mid, hi) = (tri[0], tri[1], tri[2]);
            (0..n_bins)
                .filter_map(|bin| {
                    let f = bin as f32 * bin_hz;
                    let w = if f > lo && f <= mid {
                        (f - lo) / (mid - lo)
                    } else if f > mid && f < hi {
                        (hi - f) / (hi - mid)
                    } else {
                        0.0
                    };
                    (w > 0.0).then_some((bin, w))
                })
                .collect()
        })
        .collect()
}
