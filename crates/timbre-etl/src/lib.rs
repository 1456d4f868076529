//! Ingestion side of timbre.
//!
//! Decodes audio, turns it into embeddings under a versioned extraction
//! profile, caches those embeddings on disk, and discovers the audio files
//! of a music library.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod audio;
pub mod cache;
pub mod config;
pub mod convert;
pub mod extract;
pub mod scan;
pub mod tags;

pub use cache::{CacheKey, CacheStats, EmbeddingCache};
pub use config::Config;
pub use extract::{extractor_for, EmbeddingExtractor};
pub use scan::scan_library;
