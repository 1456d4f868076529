//! Embedding extractors.
//!
//! An extractor turns one audio file into one [`Embedding`] under a fixed
//! [`ExtractionProfile`]. The cache and the index builder only see the
//! [`EmbeddingExtractor`] trait, so tests can substitute a deterministic fake.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use timbre_core::{Embedding, Error, ExtractionProfile, ModelVariant, Result};

use crate::audio::{chroma_embedding, decode_audio, spectral_embedding};

/// Produces fixed-length embeddings from audio files.
pub trait EmbeddingExtractor: Send + Sync + fmt::Debug {
    /// Settings every embedding from this extractor is produced under.
    fn profile(&self) -> &ExtractionProfile;

    /// Embed one file. Unreadable, corrupt or empty audio is an
    /// [`Error::Extraction`].
    fn extract(&self, path: &Path) -> Result<Embedding>;
}

/// Build the extractor selected by `profile`.
pub fn extractor_for(profile: &ExtractionProfile) -> Result<Arc<dyn EmbeddingExtractor>> {
    profile.validate()?;
    let extractor: Arc<dyn EmbeddingExtractor> = match profile.model {
        ModelVariant::Spectral => Arc::new(SpectralExtractor {
            profile: profile.clone(),
        }),
        ModelVariant::Chroma => Arc::new(ChromaExtractor {
            profile: profile.clone(),
        }),
    };
    Ok(extractor)
}

/// Mel-band log-energy statistics (see [`spectral_embedding`]).
#[derive(Debug, Clone)]
pub struct SpectralExtractor {
    profile: ExtractionProfile,
}

impl SpectralExtractor {
    pub fn new(profile: ExtractionProfile) -> Result<Self> {
        require_model(&profile, ModelVariant::Spectral)?;
        Ok(Self { profile })
    }
}

impl EmbeddingExtractor for SpectralExtractor {
    fn profile(&self) -> &ExtractionProfile {
        &self.profile
    }

    fn extract(&self, path: &Path) -> Result<Embedding> {
        log::debug!("Extracting spectral embedding for {}", path.display());
        let values = decode_audio(path, self.profile.sample_rate)
            .and_then(|audio| {
                spectral_embedding(&audio.samples, audio.sample_rate, self.profile.embedding_size)
            })
            .map_err(|e| extraction_error(path, &e))?;
        checked(&self.profile, path, values)
    }
}

/// Chromaprint bit-occupancy vector (see [`chroma_embedding`]).
#[derive(Debug, Clone)]
pub struct ChromaExtractor {
    profile: ExtractionProfile,
}

impl ChromaExtractor {
    pub fn new(profile: ExtractionProfile) -> Result<Self> {
        require_model(&profile, ModelVariant::Chroma)?;
        Ok(Self { profile })
    }
}

impl EmbeddingExtractor for ChromaExtractor {
    fn profile(&self) -> &ExtractionProfile {
        &self.profile
    }

    fn extract(&self, path: &Path) -> Result<Embedding> {
        log::debug!("Extracting chroma embedding for {}", path.display());
        let values = decode_audio(path, self.profile.sample_rate)
            .and_then(|audio| chroma_embedding(&audio.samples, audio.sample_rate))
            .map_err(|e| extraction_error(path, &e))?;
        checked(&self.profile, path, values)
    }
}

fn require_model(profile: &ExtractionProfile, model: ModelVariant) -> Result<()> {
    profile.validate()?;
    if profile.model == model {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "profile selects the {} model, not {}",
            profile.model, model
        )))
    }
}

fn extraction_error(path: &Path, err: &anyhow::Error) -> Error {
    Error::Extraction {
        path: path.to_path_buf(),
        message: format!("{err:#}"),
    }
}

fn checked(profile: &ExtractionProfile, path: &Path, values: Vec<f32>) -> Result<Embedding> {
    if values.len() != profile.embedding_size {
        return Err(Error::Extraction {
            path: path.to_path_buf(),
            message: format!(
                "extractor produced {} values, profile expects {}",
                values.len(),
                profile.embedding_size
            ),
        });
    }
    Ok(Embedding::new(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use timbre_core::CHROMA_DIM;

    #[test]
    fn test_extractor_for_selects_model() {
        let spectral = extractor_for(&ExtractionProfile::default()).unwrap();
        assert_eq!(spectral.profile().model, ModelVariant::Spectral);

        let chroma_profile = ExtractionProfile {
            model: ModelVariant::Chroma,
            embedding_size: CHROMA_DIM,
            ..ExtractionProfile::default()
        };
        let chroma = extractor_for(&chroma_profile).unwrap();
        assert_eq!(chroma.profile().model, ModelVariant::Chroma);
    }

    #[test]
    fn test_extractor_for_rejects_invalid_profile() {
        let profile = ExtractionProfile {
            model: ModelVariant::Chroma,
            ..ExtractionProfile::default()
        };
        assert!(extractor_for(&profile).unwrap_err().is_config_error());
    }

    #[test]
    fn test_constructor_rejects_wrong_model() {
        assert!(ChromaExtractor::new(ExtractionProfile::default()).is_err());
    }

    #[test]
    fn test_missing_file_is_extraction_error() {
        let extractor = SpectralExtractor::new(ExtractionProfile::default()).unwrap();
        let err = extractor.extract(Path::new("/nonexistent/file.mp3")).unwrap_err();
        match err {
            Error::Extraction { path, message } => {
                assert_eq!(path, Path::new("/nonexistent/file.mp3"));
                assert!(message.contains("Failed to open audio file"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
