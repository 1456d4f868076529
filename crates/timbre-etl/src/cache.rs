//! On-disk embedding cache.
//!
//! One `.emb` file per track under the cache directory. Each entry carries
//! the stamp of the extraction profile it was computed under; entries with a
//! different stamp are stale and are recomputed rather than reused.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use timbre_core::codec::{decode_embedding, encode_embedding, write_atomic, StoredEmbedding};
use timbre_core::{Embedding, Error, ExtractionProfile, Result};

use crate::extract::EmbeddingExtractor;

const ENTRY_EXTENSION: &str = "emb";

/// How a track maps to its cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheKey {
    /// SHA-256 of the file content. Identical audio shares one entry and
    /// same-named files in different directories never collide.
    #[default]
    ContentHash,
    /// The file's base name. Two different files with the same name in
    /// different directories share (and overwrite) one entry.
    FileName,
}

/// Summary of the cache directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub stale: usize,
    pub total_bytes: u64,
}

/// Embedding cache backed by one file per track.
///
/// There is no locking: concurrent misses for the same track both extract
/// and the last rename wins. Entries are written atomically, so a reader
/// never sees a half-written vector.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    dir: PathBuf,
    key: CacheKey,
    extractor: Arc<dyn EmbeddingExtractor>,
}

impl EmbeddingCache {
    #[must_use]
    pub fn new(dir: PathBuf, key: CacheKey, extractor: Arc<dyn EmbeddingExtractor>) -> Self {
        Self {
            dir,
            key,
            extractor,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn profile(&self) -> &ExtractionProfile {
        self.extractor.profile()
    }

    #[must_use]
    pub fn extractor(&self) -> &Arc<dyn EmbeddingExtractor> {
        &self.extractor
    }

    /// Path of the cache entry for `track`.
    pub fn entry_path(&self, track: &Path) -> Result<PathBuf> {
        let key = match self.key {
            CacheKey::ContentHash => content_hash(track)?,
            CacheKey::FileName => track
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    Error::InvalidInput(format!("track path has no file name: {}", track.display()))
                })?,
        };
        Ok(self.dir.join(format!("{key}.{ENTRY_EXTENSION}")))
    }

    /// Return the cached embedding for `track`, extracting and storing it on
    /// a miss.
    pub fn get_or_compute(&self, track: &Path) -> Result<Embedding> {
        if !track.is_file() {
            return Err(Error::NotFound {
                entity: "track",
                path: track.to_path_buf(),
            });
        }

        fs::create_dir_all(&self.dir)?;
        let entry = self.entry_path(track)?;

        if let Some(embedding) = self.read_entry(&entry)? {
            log::debug!("Cache hit for {} ({})", track.display(), entry.display());
            return Ok(embedding);
        }

        log::info!("Extracting embedding for {}", track.display());
        let embedding = self.extractor.extract(track)?;
        let expected = self.profile().embedding_size;
        if embedding.dim() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: embedding.dim(),
                context: track.display().to_string(),
            });
        }
        write_atomic(
            &entry,
            &encode_embedding(self.profile().stamp(), embedding.as_slice()),
        )?;
        log::info!("Saved embedding to {}", entry.display());

        Ok(embedding)
    }

    /// Read a cache entry, returning `None` when it is absent, stale or
    /// unreadable.
    fn read_entry(&self, entry: &Path) -> Result<Option<Embedding>> {
        let bytes = match fs::read(entry) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let profile = self.profile();
        match decode_embedding(entry, &bytes) {
            Ok(stored) if self.matches_profile(&stored) => {
                Ok(Some(Embedding::new(stored.values)))
            }
            Ok(stored) => {
                log::warn!(
                    "Stale cache entry {} (stamp {:016x}, {} values; active {:016x}, {} values); recomputing",
                    entry.display(),
                    stored.stamp,
                    stored.values.len(),
                    profile.stamp(),
                    profile.embedding_size
                );
                Ok(None)
            }
            Err(e) => {
                log::warn!("Unreadable cache entry {}: {}; recomputing", entry.display(), e);
                Ok(None)
            }
        }
    }

    /// Count entries, flagging those that would not be reused.
    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for entry in self.entries()? {
            stats.entries += 1;
            stats.total_bytes += fs::metadata(&entry)?.len();
            if !self.is_current(&entry) {
                stats.stale += 1;
            }
        }
        Ok(stats)
    }

    /// Delete entries computed under another profile or that fail to decode.
    /// Returns the number of files removed.
    pub fn prune(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in self.entries()? {
            if !self.is_current(&entry) {
                log::info!("Removing stale cache entry {}", entry.display());
                fs::remove_file(&entry)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn is_current(&self, entry: &Path) -> bool {
        fs::read(entry)
            .ok()
            .and_then(|bytes| decode_embedding(entry, &bytes).ok())
            .is_some_and(|stored| self.matches_profile(&stored))
    }

    /// Whether a stored entry can be reused under the active profile.
    fn matches_profile(&self, stored: &StoredEmbedding) -> bool {
        let profile = self.profile();
        stored.stamp == profile.stamp() && stored.values.len() == profile.embedding_size
    }

    fn entries(&self) -> Result<Vec<PathBuf>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for dir_entry in read_dir {
            let path = dir_entry?.path();
            let hidden = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with('.'));
            if path.is_file()
                && !hidden
                && path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
            {
                entries.push(path);
            }
        }
        entries.sort();
        Ok(entries)
    }
}

fn content_hash(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound {
            entity: "track",
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
