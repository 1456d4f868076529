//! Core domain model for timbre.
//!
//! This crate defines the track and embedding types, the versioned
//! extraction profile, the error taxonomy shared by every pipeline stage,
//! and the on-disk binary codec for embedding vectors.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod codec;
pub mod error;
pub mod model;

pub use error::{Error, Result};
pub use model::{
    squared_l2, Embedding, ExtractionProfile, ModelVariant, Recommendation, TrackId, CHROMA_DIM,
};
