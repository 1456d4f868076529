pub mod chroma;
pub mod decoder;
pub mod spectral;

pub use chroma::chroma_embedding;
pub use decoder::{decode_audio, DecodedAudio};
pub use spectral::spectral_embedding;
