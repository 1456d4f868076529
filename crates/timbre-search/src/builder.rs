//! Full index rebuilds from a list of tracks.

use std::path::PathBuf;
use timbre_core::{Embedding, Error, Result, TrackId};
use timbre_etl::EmbeddingCache;

use crate::artifacts::{is_listable, IndexStore, Manifest};
use crate::flat::FlatIndex;

/// A track left out of a build, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTrack {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub manifest: Manifest,
    pub indexed: usize,
    pub skipped: Vec<SkippedTrack>,
}

/// Rebuilds the index from scratch through the embedding cache.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    cache: EmbeddingCache,
    store: IndexStore,
}

impl IndexBuilder {
    #[must_use]
    pub fn new(cache: EmbeddingCache, store: IndexStore) -> Self {
        Self { cache, store }
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Embed `tracks` in order and replace the persisted index.
    ///
    /// Row `i` of the new index is the `i`-th track that embedded
    /// successfully. Files that fail to embed are skipped and reported.
    /// Configuration errors (dimension or profile mismatch) abort the build
    /// before any artifact is touched.
    pub fn build(&self, tracks: &[PathBuf]) -> Result<BuildReport> {
        let lock = self.store.lock()?;

        let mut ids = Vec::with_capacity(tracks.len());
        let mut embeddings = Vec::with_capacity(tracks.len());
        let mut skipped = Vec::new();

        for (idx, track) in tracks.iter().enumerate() {
            let progress = format!("[{}/{}]", idx + 1, tracks.len());

            if !is_listable(track) {
                log::warn!(
                    "{} Skipping {}: path is not UTF-8 or contains a line break",
                    progress,
                    track.display()
                );
                skipped.push(SkippedTrack {
                    path: track.clone(),
                    reason: "path cannot be stored in the identifier list".to_string(),
                });
                continue;
            }

            match self.cache.get_or_compute(track) {
                Ok(embedding) => {
                    log::debug!("{} Embedded {}", progress, track.display());
                    ids.push(TrackId::new(track.clone()));
                    embeddings.push(embedding);
                }
                Err(e) if e.is_config_error() => return Err(e),
                Err(e) => {
                    log::warn!("{} Skipping {}: {}", progress, track.display(), e);
                    skipped.push(SkippedTrack {
                        path: track.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if embeddings.is_empty() {
            return Err(Error::EmptyBuild);
        }
        check_uniform_dimension(&ids, &embeddings)?;

        let index = FlatIndex::from_embeddings(&embeddings)?;
        let manifest = self.store.write(&lock, self.cache.profile(), &index, &ids)?;

        log::info!(
            "Indexed {} tracks ({} skipped) into {}",
            ids.len(),
            skipped.len(),
            self.store.dir().display()
        );

        Ok(BuildReport {
            manifest,
            indexed: ids.len(),
            skipped,
        })
    }
}

fn check_uniform_dimension(ids: &[TrackId], embeddings: &[Embedding]) -> Result<()> {
    let Some(expected) = embeddings.first().map(Embedding::dim) else {
        return Ok(());
    };
    for (id, embedding) in ids.iter().zip(embeddings) {
        if embedding.dim() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: embedding.dim(),
                context: id.path().display().to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_dimension_reports_first_offender() {
        let ids = vec![
            TrackId::new("/m/a.mp3"),
            TrackId::new("/m/b.mp3"),
            TrackId::new("/m/c.mp3"),
        ];
        let embeddings = vec![
            Embedding::new(vec![0.0; 4]),
            Embedding::new(vec![0.0; 4]),
            Embedding::new(vec![0.0; 3]),
        ];

        match check_uniform_dimension(&ids, &embeddings) {
            Err(Error::DimensionMismatch {
                expected,
                actual,
                context,
            }) => {
                assert_eq!((expected, actual), (4, 3));
                assert_eq!(context, "/m/c.mp3");
            }
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }
}
