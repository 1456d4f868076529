//! Persistence of the index and its identifier list.
//!
//! Three files live in the index directory:
//!
//! - `index.bin`: the embedding matrix (see [`timbre_core::codec`]).
//! - `tracks.txt`: one track path per line; line `i` names row `i`.
//! - `manifest.json`: build metadata plus a SHA-256 of the other two files.
//!
//! Each file is replaced by an atomic rename and the manifest is written
//! last. A reader that catches a rebuild half-way sees checksums that do not
//! match and gets [`Error::InconsistentIndex`] instead of misaligned results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use timbre_core::codec::{decode_matrix, encode_matrix, sha256_hex, write_atomic};
use timbre_core::{Error, ExtractionProfile, Result, TrackId};
use uuid::Uuid;

use crate::flat::FlatIndex;

pub const INDEX_FILE: &str = "index.bin";
pub const TRACKS_FILE: &str = "tracks.txt";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const LOCK_FILE: &str = ".build.lock";

/// Commit record binding `index.bin` and `tracks.txt` together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub build_id: Uuid,
    pub built_at: DateTime<Utc>,
    pub profile: ExtractionProfile,
    /// Hex form of `profile.stamp()` at build time.
    pub profile_stamp: String,
    pub dimension: usize,
    pub count: usize,
    pub index_sha256: String,
    pub tracks_sha256: String,
}

/// A verified index/identifier pair.
#[derive(Debug, Clone)]
pub struct LoadedIndex {
    pub manifest: Manifest,
    pub index: FlatIndex,
    pub tracks: Vec<TrackId>,
}

/// Held for the duration of a build; removes the lock file on drop.
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to release build lock {}: {}", self.path.display(), e);
        }
    }
}

/// The index directory and the files in it.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn tracks_path(&self) -> PathBuf {
        self.dir.join(TRACKS_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    /// Take the exclusive build lock.
    ///
    /// Fails with [`Error::Locked`] while another build holds it. A lock left
    /// behind by a crashed build must be removed by hand.
    pub fn lock(&self) -> Result<BuildLock> {
        self.lock_with(|file| writeln!(file, "{}", std::process::id()))
    }

    /// Create the lock file, then let `record_owner` fill it in. The file is
    /// removed again if that fails.
    fn lock_with(
        &self,
        record_owner: impl FnOnce(&mut fs::File) -> io::Result<()>,
    ) -> Result<BuildLock> {
        fs::create_dir_all(&self.dir)?;
        let path = self.lock_path();
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::Locked { path });
            }
            Err(e) => return Err(e.into()),
        };
        let lock = BuildLock { path };
        record_owner(&mut file)?;
        log::debug!("Acquired build lock {}", lock.path.display());
        Ok(lock)
    }

    /// Persist `index` and `tracks` as one build.
    ///
    /// The caller should hold the [`BuildLock`].
    pub fn write(
        &self,
        _lock: &BuildLock,
        profile: &ExtractionProfile,
        index: &FlatIndex,
        tracks: &[TrackId],
    ) -> Result<Manifest> {
        if index.len() != tracks.len() {
            return Err(Error::Internal(format!(
                "{} index rows but {} identifiers",
                index.len(),
                tracks.len()
            )));
        }

        let index_bytes = encode_matrix(profile.stamp(), index.dim(), index.as_raw())?;
        let tracks_bytes = encode_tracks(tracks)?;

        let manifest = Manifest {
            build_id: Uuid::new_v4(),
            built_at: Utc::now(),
            profile: profile.clone(),
            profile_stamp: format!("{:016x}", profile.stamp()),
            dimension: index.dim(),
            count: index.len(),
            index_sha256: sha256_hex(&index_bytes),
            tracks_sha256: sha256_hex(&tracks_bytes),
        };

        write_atomic(&self.index_path(), &index_bytes)?;
        write_atomic(&self.tracks_path(), &tracks_bytes)?;
        write_atomic(
            &self.manifest_path(),
            serde_json::to_string_pretty(&manifest)?.as_bytes(),
        )?;

        log::info!(
            "Index {} written: {} tracks, dimension {}",
            manifest.build_id,
            manifest.count,
            manifest.dimension
        );
        Ok(manifest)
    }

    pub fn manifest(&self) -> Result<Manifest> {
        let bytes = read_artifact(&self.manifest_path(), "index manifest")?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Load the identifier list, verified against the manifest.
    pub fn load_tracks(&self) -> Result<Vec<TrackId>> {
        let manifest = self.manifest()?;
        let tracks = self.read_tracks(&manifest)?;
        if tracks.len() != manifest.count {
            return Err(Error::InconsistentIndex(format!(
                "{TRACKS_FILE} lists {} tracks, manifest says {}",
                tracks.len(),
                manifest.count
            )));
        }
        Ok(tracks)
    }

    /// Load and cross-check manifest, index and identifier list.
    pub fn load(&self) -> Result<LoadedIndex> {
        let manifest = self.manifest()?;

        let index_path = self.index_path();
        let index_bytes = read_artifact(&index_path, "index")?;
        verify_checksum(INDEX_FILE, &index_bytes, &manifest.index_sha256)?;
        let tracks = self.read_tracks(&manifest)?;

        let matrix = decode_matrix(&index_path, &index_bytes)?;
        let stamp = format!("{:016x}", matrix.stamp);
        if stamp != manifest.profile_stamp {
            return Err(Error::InconsistentIndex(format!(
                "{INDEX_FILE} stamped {stamp}, manifest says {}",
                manifest.profile_stamp
            )));
        }
        if matrix.dim != manifest.dimension
            || matrix.count != manifest.count
            || tracks.len() != matrix.count
        {
            return Err(Error::InconsistentIndex(format!(
                "{} rows of dimension {} with {} identifiers, manifest says {} x {}",
                matrix.count,
                matrix.dim,
                tracks.len(),
                manifest.count,
                manifest.dimension
            )));
        }

        let index = FlatIndex::from_raw(matrix.dim, matrix.data)?;
        Ok(LoadedIndex {
            manifest,
            index,
            tracks,
        })
    }

    fn read_tracks(&self, manifest: &Manifest) -> Result<Vec<TrackId>> {
        let bytes = read_artifact(&self.tracks_path(), "identifier list")?;
        verify_checksum(TRACKS_FILE, &bytes, &manifest.tracks_sha256)?;
        decode_tracks(&self.tracks_path(), &bytes)
    }
}

/// Whether `track` can be stored as one line of the identifier list.
pub fn is_listable(track: &Path) -> bool {
    track
        .to_str()
        .is_some_and(|s| !s.is_empty() && !s.contains(['\n', '\r']))
}

fn encode_tracks(tracks: &[TrackId]) -> Result<Vec<u8>> {
    let mut out = String::new();
    for track in tracks {
        if !is_listable(track.path()) {
            return Err(Error::InvalidInput(format!(
                "track path cannot be stored in {TRACKS_FILE}: {track}"
            )));
        }
        out.push_str(&track.to_string());
        out.push('\n');
    }
    Ok(out.into_bytes())
}

fn decode_tracks(path: &Path, bytes: &[u8]) -> Result<Vec<TrackId>> {
    let text = std::str::from_utf8(bytes).map_err(|e| Error::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(text.lines().map(TrackId::new).collect())
}

fn read_artifact(path: &Path, entity: &'static str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound {
            entity,
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })
}

fn verify_checksum(name: &str, bytes: &[u8], expected: &str) -> Result<()> {
    if sha256_hex(bytes) == expected {
        Ok(())
    } else {
        Err(Error::InconsistentIndex(format!(
            "{name} does not match the manifest (rebuilt concurrently or modified by hand)"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use timbre_core::Embedding;

    fn sample_index() -> (FlatIndex, Vec<TrackId>) {
        let index = FlatIndex::from_embeddings(&[
            Embedding::new(vec![1.0, 0.0]),
            Embedding::new(vec![0.0, 1.0]),
        ])
        .unwrap();
        let tracks = vec![TrackId::new("/music/a.mp3"), TrackId::new("/music/b c.mp3")];
        (index, tracks)
    }

    fn profile() -> ExtractionProfile {
        ExtractionProfile {
            embedding_size: 2,
            ..ExtractionProfile::default()
        }
    }

    #[test]
    fn test_write_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path().join("index"));
        let (index, tracks) = sample_index();

        let lock = store.lock().unwrap();
        let manifest = store.write(&lock, &profile(), &index, &tracks).unwrap();
        drop(lock);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.manifest, manifest);
        assert_eq!(loaded.index, index);
        assert_eq!(loaded.tracks, tracks);
        assert_eq!(store.load_tracks().unwrap(), tracks);
        assert!(!store.lock_path().exists());
    }

    #[test]
    fn test_identifier_list_is_plain_text() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path().to_path_buf());
        let (index, tracks) = sample_index();
        let lock = store.lock().unwrap();
        store.write(&lock, &profile(), &index, &tracks).unwrap();

        let text = fs::read_to_string(store.tracks_path()).unwrap();
        assert_eq!(text, "/music/a.mp3\n/music/b c.mp3\n");
    }

    #[test]
    fn test_missing_artifacts_are_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path().join("never-built"));
        assert!(store.load().unwrap_err().is_not_found());
        assert!(store.load_tracks().unwrap_err().is_not_found());

        let (index, tracks) = sample_index();
        let lock = store.lock().unwrap();
        store.write(&lock, &profile(), &index, &tracks).unwrap();
        fs::remove_file(store.index_path()).unwrap();
        assert!(store.load().unwrap_err().is_not_found());
    }

    #[test]
    fn test_swapped_identifier_list_is_detected() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path().to_path_buf());
        let (index, tracks) = sample_index();
        let lock = store.lock().unwrap();
        store.write(&lock, &profile(), &index, &tracks).unwrap();

        fs::write(store.tracks_path(), "/music/b c.mp3\n/music/a.mp3\n").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::InconsistentIndex(_)), "got {err}");
    }

    #[test]
    fn test_lock_is_exclusive() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path().to_path_buf());

        let held = store.lock().unwrap();
        assert!(matches!(store.lock(), Err(Error::Locked { .. })));
        drop(held);
        assert!(store.lock().is_ok());
    }

    #[test]
    fn test_failed_owner_write_releases_lock() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path().to_path_buf());

        let result = store.lock_with(|_| Err(io::Error::other("disk full")));
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(!store.lock_path().exists());

        let lock = store.lock().unwrap();
        let owner = fs::read_to_string(store.lock_path()).unwrap();
        assert_eq!(owner.trim(), std::process::id().to_string());
        drop(lock);
        assert!(!store.lock_path().exists());
    }

    #[test]
    fn test_unlistable_paths_rejected() {
        assert!(is_listable(Path::new("/music/a.mp3")));
        assert!(!is_listable(Path::new("/music/bad\nname.mp3")));
        assert!(!is_listable(Path::new("")));
    }
}
