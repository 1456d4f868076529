use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {entity} at {}", path.display())]
    NotFound { entity: &'static str, path: PathBuf },

    /// Vectors of differing length were mixed in one build or query.
    #[error("dimension mismatch: expected {expected}, got {actual} ({context})")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        context: String,
    },

    /// The index was built under a different extraction profile.
    #[error("extraction profile mismatch: index stamped {index:016x}, active profile {active:016x}")]
    ProfileMismatch { index: u64, active: u64 },

    #[error("inconsistent index artifacts: {0}")]
    InconsistentIndex(String),

    #[error("no embeddable tracks to index")]
    EmptyBuild,

    #[error("extraction failed for {}: {message}", path.display())]
    Extraction { path: PathBuf, message: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("build already in progress (lock held at {})", path.display())]
    Locked { path: PathBuf },

    #[error("corrupt artifact {}: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns `true` for errors caused by incompatible extraction settings
    /// or invalid configuration rather than by a particular input file.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. } | Self::ProfileMismatch { .. } | Self::InvalidConfig(_)
        )
    }

    /// Returns `true` when a requested file or artifact does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_classification() {
        let err = Error::DimensionMismatch {
            expected: 128,
            actual: 32,
            context: "b.mp3".to_string(),
        };
        assert!(err.is_config_error());
        assert!(Error::ProfileMismatch { index: 1, active: 2 }.is_config_error());
        assert!(!Error::EmptyBuild.is_config_error());
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::NotFound {
            entity: "index",
            path: PathBuf::from("/data/index/index.bin"),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: index at /data/index/index.bin");
    }
}
