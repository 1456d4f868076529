//! Vector search for timbre.
//!
//! Builds an exact (flat, exhaustive) nearest-neighbor index over cached
//! track embeddings, persists it next to the ordered identifier list, and
//! answers "similar track" queries against that pair.
//!
//! ```text
//! tracks -> EmbeddingCache -> IndexBuilder -> index.bin + tracks.txt + manifest.json
//!                                                          |
//! query file -> extractor -> Recommender <-----------------+
//!                                 |
//!                      [(track, distance), ...]
//! ```

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod artifacts;
pub mod builder;
pub mod flat;
pub mod query;
pub mod sample;

pub use artifacts::{BuildLock, IndexStore, LoadedIndex, Manifest};
pub use builder::{BuildReport, IndexBuilder, SkippedTrack};
pub use flat::{FlatIndex, Neighbor};
pub use query::Recommender;
pub use sample::{random_sample, sample_tracks};
