pub mod build;
pub mod cache;
pub mod config;
pub mod convert;
pub mod inspect;
pub mod random;
pub mod recommend;
pub mod serve;
pub mod status;

pub use build::run_build;
pub use convert::run_convert;
pub use inspect::run_inspect;
pub use random::run_random;
pub use recommend::run_recommend;
pub use serve::run_serve;
pub use status::show_status;

use anyhow::{Context, Result};
use timbre_etl::{extractor_for, Config, EmbeddingCache};
use timbre_search::{IndexStore, Recommender};

/// Embedding cache for the configured profile and key strategy.
pub fn open_cache(config: &Config) -> Result<EmbeddingCache> {
    let extractor = extractor_for(&config.extraction).context("Invalid extraction settings")?;
    Ok(EmbeddingCache::new(
        config.cache_dir(),
        config.cache_key,
        extractor,
    ))
}

pub fn open_store(config: &Config) -> IndexStore {
    IndexStore::new(config.index_dir())
}

pub fn open_recommender(config: &Config) -> Result<Recommender> {
    let extractor = extractor_for(&config.extraction).context("Invalid extraction settings")?;
    Ok(Recommender::new(open_store(config), extractor))
}
