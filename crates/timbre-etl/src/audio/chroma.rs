use anyhow::{bail, Context, Result};
use rusty_chromaprint::{Configuration, Fingerprinter};
use timbre_core::CHROMA_DIM;

/// Summarise a chromaprint fingerprint as a fixed-length vector.
///
/// Each of the 32 output values is the fraction of sub-fingerprints that have
/// the corresponding bit set, so tracks of any length map to the same space.
pub fn chroma_embedding(samples: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
    let config = Configuration::preset_test2();
    let mut fpr = Fingerprinter::new(&config);

    let samples_i16: Vec<i16> = samples
        .iter()
        .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
        .collect();

    fpr.start(sample_rate, 1)
        .context("Failed to start fingerprinter")?;
    fpr.consume(&samples_i16);
    fpr.finish();

    bit_occupancy(fpr.fingerprint())
}

fn bit_occupancy(fingerprint: &[u32]) -> Result<Vec<f32>> {
    if fingerprint.is_empty() {
        bail!("audio too short for fingerprinting");
    }

    let mut counts = [0u32; CHROMA_DIM];
    for word in fingerprint {
        for (bit, count) in counts.iter_mut().enumerate() {
            *count += (word >> bit) & 1;
        }
    }

    let total = fingerprint.len() as f32;
    Ok(counts.iter().map(|&c| c as f32 / total).collect())
}
