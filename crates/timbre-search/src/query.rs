//! "Tracks similar to this one" queries.

use std::path::Path;
use std::sync::Arc;
use timbre_core::{Error, Recommendation, Result};
use timbre_etl::EmbeddingExtractor;

use crate::artifacts::{IndexStore, LoadedIndex};

/// Answers similarity queries against the persisted index.
///
/// Artifacts are re-read for every query, so a rebuild is picked up without
/// restarting a long-running server.
#[derive(Debug, Clone)]
pub struct Recommender {
    store: IndexStore,
    extractor: Arc<dyn EmbeddingExtractor>,
}

impl Recommender {
    #[must_use]
    pub fn new(store: IndexStore, extractor: Arc<dyn EmbeddingExtractor>) -> Self {
        Self { store, extractor }
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn extractor(&self) -> &Arc<dyn EmbeddingExtractor> {
        &self.extractor
    }

    /// The `top_k` indexed tracks closest to `query`, closest first.
    ///
    /// The query is embedded directly, bypassing the cache. It may or may
    /// not be an indexed track; when it is, it comes back first at distance
    /// zero.
    pub fn recommend(&self, query: &Path, top_k: usize) -> Result<Vec<Recommendation>> {
        if top_k == 0 {
            return Err(Error::InvalidInput("top_k must be at least 1".to_string()));
        }
        if !query.is_file() {
            return Err(Error::NotFound {
                entity: "query track",
                path: query.to_path_buf(),
            });
        }

        let loaded = self.store.load()?;
        self.check_profile(&loaded)?;

        log::debug!("Embedding query {}", query.display());
        let embedding = self.extractor.extract(query)?;
        let recommendations = search_loaded(&loaded, embedding.as_slice(), top_k)?;

        log::info!(
            "{} recommendations for {} from {} indexed tracks",
            recommendations.len(),
            query.display(),
            loaded.tracks.len()
        );
        Ok(recommendations)
    }

    fn check_profile(&self, loaded: &LoadedIndex) -> Result<()> {
        let active = self.extractor.profile().stamp();
        let index = u64::from_str_radix(&loaded.manifest.profile_stamp, 16).map_err(|_| {
            Error::InconsistentIndex(format!(
                "unreadable profile stamp in manifest: {:?}",
                loaded.manifest.profile_stamp
            ))
        })?;
        if index == active {
            Ok(())
        } else {
            Err(Error::ProfileMismatch { index, active })
        }
    }
}

/// Exact search of `query` against a loaded index.
///
/// Positions without an identifier are dropped with a warning; they are
/// never mapped onto a track.
pub fn search_loaded(
    loaded: &LoadedIndex,
    query: &[f32],
    top_k: usize,
) -> Result<Vec<Recommendation>> {
    if top_k == 0 {
        return Err(Error::InvalidInput("top_k must be at least 1".to_string()));
    }
    if query.len() != loaded.index.dim() {
        return Err(Error::DimensionMismatch {
            expected: loaded.index.dim(),
            actual: query.len(),
            context: "query embedding".to_string(),
        });
    }

    let k = top_k.min(loaded.index.len());
    let mut recommendations = Vec::with_capacity(k);
    for neighbor in loaded.index.search(query, k)? {
        match loaded.tracks.get(neighbor.position) {
            Some(track) => recommendations.push(Recommendation {
                identifier: track.clone(),
                distance: neighbor.distance,
            }),
            None => log::warn!(
                "Index position {} has no identifier ({} listed); dropping it",
                neighbor.position,
                loaded.tracks.len()
            ),
        }
    }

    if let Some(pair) = recommendations
        .windows(2)
        .find(|pair| pair[0].distance > pair[1].distance)
    {
        return Err(Error::Internal(format!(
            "search results out of order: {} before {}",
            pair[0].distance, pair[1].distance
        )));
    }

    Ok(recommendations)
}
