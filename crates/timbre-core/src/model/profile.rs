use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{Error, Result};

/// Number of bits in one chromaprint sub-fingerprint.
pub const CHROMA_DIM: usize = 32;

/// Which embedding extractor produced a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelVariant {
    /// Mel-band log-energy statistics over an STFT.
    Spectral,
    /// Per-bit occupancy of chromaprint sub-fingerprints.
    Chroma,
}

impl ModelVariant {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spectral => "spectral",
            Self::Chroma => "chroma",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extraction settings that determine an embedding.
///
/// Two embeddings are only comparable when they were produced under profiles
/// with the same [`stamp`](Self::stamp). Bump `version` whenever the
/// extractor's algorithm changes without a change to the other fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionProfile {
    #[serde(default = "default_model")]
    pub model: ModelVariant,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_embedding_size")]
    pub embedding_size: usize,
    #[serde(default = "default_version")]
    pub version: u32,
}

impl Default for ExtractionProfile {
    fn default() -> Self {
        Self {
            model: default_model(),
            sample_rate: default_sample_rate(),
            embedding_size: default_embedding_size(),
            version: default_version(),
        }
    }
}

impl ExtractionProfile {
    /// Canonical text form hashed by [`stamp`](Self::stamp).
    #[must_use]
    pub fn canonical(&self) -> String {
        format!(
            "model={};sample_rate={};embedding_size={};version={}",
            self.model, self.sample_rate, self.embedding_size, self.version
        )
    }

    /// Stable 64-bit identifier of this profile, written into every cache
    /// entry and index artifact.
    #[must_use]
    pub fn stamp(&self) -> u64 {
        let digest = Sha256::digest(self.canonical().as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Check that the settings are usable by the selected model.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate < 8000 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate must be at least 8000 Hz, got {}",
                self.sample_rate
            )));
        }
        match self.model {
            ModelVariant::Spectral => {
                if self.embedding_size < 2 || self.embedding_size % 2 != 0 {
                    return Err(Error::InvalidConfig(format!(
                        "spectral embedding_size must be an even number >= 2, got {}",
                        self.embedding_size
                    )));
                }
            }
            ModelVariant::Chroma => {
                if self.embedding_size != CHROMA_DIM {
                    return Err(Error::InvalidConfig(format!(
                        "chroma embedding_size must be {CHROMA_DIM}, got {}",
                        self.embedding_size
                    )));
                }
            }
        }
        Ok(())
    }
}

const fn default_model() -> ModelVariant {
    ModelVariant::Spectral
}

const fn default_sample_rate() -> u32 {
    22050
}

const fn default_embedding_size() -> usize {
    128
}

const fn default_version() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_is_valid() {
        assert!(ExtractionProfile::default().validate().is_ok());
    }

    #[test]
    fn test_stamp_is_stable() {
        let a = ExtractionProfile::default();
        let b = ExtractionProfile::default();
        assert_eq!(a.stamp(), b.stamp());
    }

    #[test]
    fn test_stamp_changes_with_settings() {
        let base = ExtractionProfile::default();
        let resampled = ExtractionProfile {
            sample_rate: 48000,
            ..base.clone()
        };
        let bumped = ExtractionProfile {
            version: 2,
            ..base.clone()
        };
        assert_ne!(base.stamp(), resampled.stamp());
        assert_ne!(base.stamp(), bumped.stamp());
    }

    #[test]
    fn test_chroma_requires_32_dims() {
        let profile = ExtractionProfile {
            model: ModelVariant::Chroma,
            embedding_size: 128,
            ..ExtractionProfile::default()
        };
        let err = profile.validate().unwrap_err();
        assert!(err.is_config_error());

        let ok = ExtractionProfile {
            embedding_size: CHROMA_DIM,
            ..profile
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_spectral_rejects_odd_size() {
        let profile = ExtractionProfile {
            embedding_size: 7,
            ..ExtractionProfile::default()
        };
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_model_variant_serde() {
        let json = serde_json::to_string(&ModelVariant::Chroma).unwrap();
        assert_eq!(json, "\"chroma\"");
    }
}
