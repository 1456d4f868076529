//! Batch extraction of MP3 audio from video files.
//!
//! Encoding is delegated to an external `ffmpeg` binary. One failing file is
//! logged and skipped; it never aborts the batch.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Video container extensions picked up by [`convert_videos`].
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "flv"];

/// Outcome of a conversion batch.
#[derive(Debug, Default)]
pub struct ConvertReport {
    pub converted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Whether `path` looks like a video file.
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

/// `<output_dir>/<input stem>.mp3`.
pub fn output_path(input: &Path, output_dir: &Path) -> Option<PathBuf> {
    input
        .file_stem()
        .map(|stem| output_dir.join(format!("{}.mp3", stem.to_string_lossy())))
}

/// Convert every video file directly inside `input_dir` to an MP3 in
/// `output_dir`, creating `output_dir` if needed.
pub fn convert_videos(input_dir: &Path, output_dir: &Path, ffmpeg: &Path) -> Result<ConvertReport> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    let mut inputs: Vec<PathBuf> = fs::read_dir(input_dir)
        .with_context(|| format!("Failed to read input directory: {}", input_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_video_file(path))
        .collect();
    inputs.sort();

    let mut report = ConvertReport::default();

    for (idx, input) in inputs.iter().enumerate() {
        let progress = format!("[{}/{}]", idx + 1, inputs.len());
        let Some(output) = output_path(input, output_dir) else {
            continue;
        };

        match convert_one(ffmpeg, input, &output) {
            Ok(()) => {
                log::info!("{} Converted {} -> {}", progress, input.display(), output.display());
                report.converted.push(output);
            }
            Err(e) => {
                log::warn!("{} Error processing {}: {:#}", progress, input.display(), e);
                report.failed.push((input.clone(), format!("{e:#}")));
            }
        }
    }

    Ok(report)
}

fn convert_one(ffmpeg: &Path, input: &Path, output: &Path) -> Result<()> {
    let result = Command::new(ffmpeg)
        .arg("-hide_banner")
        .args(["-loglevel", "error", "-nostdin", "-y", "-i"])
        .arg(input)
        .args(["-vn", "-map", "0:a:0", "-codec:a", "libmp3lame", "-q:a", "2"])
        .arg(output)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("Failed to run {}", ffmpeg.display()))?;

    if !result.status.success() {
        // ffmpeg leaves a truncated file behind when there is no audio stream.
        if output.exists() {
            if let Err(e) = fs::remove_file(output) {
                log::debug!("Could not remove {}: {}", output.display(), e);
            }
        }
        let stderr = String::from_utf8_lossy(&result.stderr);
        bail!("ffmpeg exited with {}: {}", result.status, stderr.trim());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("clip.mp4")));
        assert!(is_video_file(Path::new("CLIP.MKV")));
        assert!(!is_video_file(Path::new("song.mp3")));
        assert!(!is_video_file(Path::new("noext")));
    }

    #[test]
    fn test_output_path_replaces_extension() {
        assert_eq!(
            output_path(Path::new("/videos/live.set.mov"), Path::new("/music")),
            Some(PathBuf::from("/music/live.set.mp3"))
        );
    }

    #[test]
    fn test_missing_encoder_is_per_file_failure() {
        let temp_dir = TempDir::new().unwrap();
        let input_dir = temp_dir.path().join("videos");
        let output_dir = temp_dir.path().join("mp3");
        fs::create_dir_all(&input_dir).unwrap();
        fs::write(input_dir.join("a.mp4"), b"not really a video").unwrap();
        fs::write(input_dir.join("notes.txt"), b"ignored").unwrap();

        let report = convert_videos(
            &input_dir,
            &output_dir,
            Path::new("/nonexistent/bin/ffmpeg"),
        )
        .unwrap();

        assert!(output_dir.is_dir());
        assert!(report.converted.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, input_dir.join("a.mp4"));
    }

    #[test]
    fn test_missing_input_dir_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = convert_videos(
            &temp_dir.path().join("absent"),
            &temp_dir.path().join("out"),
            Path::new("ffmpeg"),
        );
        assert!(result.is_err());
    }
}
