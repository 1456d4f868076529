//! End-to-end extraction tests on synthetic WAV fixtures.

use std::f32::consts::PI;
use std::path::Path;
use tempfile::TempDir;
use timbre_core::{Error, ExtractionProfile};
use timbre_etl::audio::decode_audio;
use timbre_etl::{extractor_for, CacheKey, EmbeddingCache};

fn write_sine_wav(path: &Path, freq: f32, sample_rate: u32, secs: f32, channels: u16) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (sample_rate as f32 * secs) as usize;
    for i in 0..frames {
        let value = (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.5;
        let sample = (value * f32::from(i16::MAX)) as i16;
        for _ in 0..channels {
            writer.write_sample(sample).unwrap();
        }
    }
    writer.finalize().unwrap();
}

#[test]
fn test_decode_stereo_wav_to_mono() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tone.wav");
    write_sine_wav(&path, 440.0, 44100, 1.0, 2);

    let audio = decode_audio(&path, 22050).unwrap();
    assert_eq!(audio.sample_rate, 22050);
    assert!((audio.duration_secs - 1.0).abs() < 0.05);
    assert!(audio.samples.iter().all(|s| s.abs() <= 1.0));
}

#[test]
fn test_spectral_extractor_on_wav() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tone.wav");
    write_sine_wav(&path, 440.0, 22050, 1.0, 1);

    let extractor = extractor_for(&ExtractionProfile::default()).unwrap();
    let a = extractor.extract(&path).unwrap();
    let b = extractor.extract(&path).unwrap();

    assert_eq!(a.dim(), 128);
    assert_eq!(a, b, "extraction must be deterministic");
}

#[test]
fn test_similar_tones_are_closer() {
    let temp_dir = TempDir::new().unwrap();
    let low = temp_dir.path().join("low.wav");
    let low_again = temp_dir.path().join("low_again.wav");
    let high = temp_dir.path().join("high.wav");
    write_sine_wav(&low, 220.0, 22050, 1.0, 1);
    write_sine_wav(&low_again, 225.0, 22050, 1.0, 1);
    write_sine_wav(&high, 4000.0, 22050, 1.0, 1);

    let extractor = extractor_for(&ExtractionProfile::default()).unwrap();
    let low = extractor.extract(&low).unwrap();
    let low_again = extractor.extract(&low_again).unwrap();
    let high = extractor.extract(&high).unwrap();

    assert!(low.squared_l2(low_again.as_slice()) < low.squared_l2(high.as_slice()));
}

#[test]
fn test_too_short_audio_is_extraction_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("blip.wav");
    write_sine_wav(&path, 440.0, 22050, 0.01, 1);

    let extractor = extractor_for(&ExtractionProfile::default()).unwrap();
    let err = extractor.extract(&path).unwrap_err();
    assert!(matches!(err, Error::Extraction { .. }), "got {err}");
}

#[test]
fn test_not_audio_is_extraction_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fake.mp3");
    std::fs::write(&path, b"this is not an mp3 file at all").unwrap();

    let extractor = extractor_for(&ExtractionProfile::default()).unwrap();
    assert!(matches!(
        extractor.extract(&path),
        Err(Error::Extraction { .. })
    ));
}

#[test]
fn test_cache_roundtrip_with_real_extractor() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tone.wav");
    write_sine_wav(&path, 330.0, 22050, 1.0, 1);

    let extractor = extractor_for(&ExtractionProfile::default()).unwrap();
    let cache = EmbeddingCache::new(
        temp_dir.path().join("cache"),
        CacheKey::ContentHash,
        extractor,
    );

    let computed = cache.get_or_compute(&path).unwrap();
    let cached = cache.get_or_compute(&path).unwrap();
    assert_eq!(computed, cached);
    assert_eq!(cache.stats().unwrap().entries, 1);
}
