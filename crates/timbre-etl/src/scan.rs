use std::path::{Path, PathBuf};
use timbre_core::{Error, Result};
use walkdir::WalkDir;

/// Extensions symphonia is built to decode.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["flac", "mp3", "ogg", "oga", "wav", "m4a", "aac"];

/// Whether `path` has one of `extensions` (case-insensitive).
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(&ext)))
}

/// Recursively collect the audio files under `music_dir`, sorted by path.
///
/// Zero-byte files (cloud-sync placeholders, aborted copies) are skipped.
/// Unreadable directory entries are logged and skipped.
pub fn scan_library(music_dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !music_dir.is_dir() {
        return Err(Error::NotFound {
            entity: "music directory",
            path: music_dir.to_path_buf(),
        });
    }

    for ext in extensions {
        if !SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            log::warn!("Extension '{}' is not a supported audio format", ext);
        }
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(music_dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry under {}: {}", music_dir.display(), e);
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() || !has_extension(path, extensions) {
            continue;
        }

        match entry.metadata() {
            Ok(metadata) if metadata.len() == 0 => {
                log::debug!("Skipping 0-byte file: {}", path.display());
            }
            Ok(_) => {
                log::debug!("Found: {}", path.display());
                files.push(path.to_path_buf());
            }
            Err(e) => log::warn!("Cannot stat {}: {}", path.display(), e),
        }
    }

    files.sort();
    log::info!(
        "Scan of {} found {} audio files",
        music_dir.display(),
        files.len()
    );
    Ok(files)
}
