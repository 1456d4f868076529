mod embedding;
mod profile;
mod track;

pub use embedding::{squared_l2, Embedding};
pub use profile::{ExtractionProfile, ModelVariant, CHROMA_DIM};
pub use track::{Recommendation, TrackId};
