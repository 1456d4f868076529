use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifies a track by its file path.
///
/// The same value is the identifier-list entry in the index, so it is kept
/// exactly as the caller supplied it (no canonicalisation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(PathBuf);

impl TrackId {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// The file's base name, or the whole path when it has none.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.0
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.0.to_string_lossy().into_owned())
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for TrackId {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&Path> for TrackId {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

impl AsRef<Path> for TrackId {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// One entry of a recommendation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub identifier: TrackId,
    /// Squared Euclidean distance to the query embedding.
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_id_display() {
        let id = TrackId::new("/music/a.mp3");
        assert_eq!(id.to_string(), "/music/a.mp3");
        assert_eq!(id.file_name(), "a.mp3");
    }

    #[test]
    fn test_recommendation_serializes_structured() {
        let rec = Recommendation {
            identifier: TrackId::new("data/music_db/b.mp3"),
            distance: 1.5,
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["identifier"], "data/music_db/b.mp3");
        assert_eq!(json["distance"], 1.5);
    }
}
