use anyhow::{Context, Result};
use std::path::PathBuf;
use timbre_etl::{scan_library, Config};
use timbre_search::IndexBuilder;

use super::{open_cache, open_store};

pub fn run_build(config: &Config, music_dir: Option<PathBuf>) -> Result<()> {
    let music_dir = music_dir.unwrap_or_else(|| config.music_dir());
    log::info!("Scanning {}", music_dir.display());

    let tracks = scan_library(&music_dir, &config.library_extensions)
        .with_context(|| format!("Failed to scan {}", music_dir.display()))?;

    if tracks.is_empty() {
        anyhow::bail!(
            "No tracks with extensions {:?} found in {}",
            config.library_extensions,
            music_dir.display()
        );
    }

    println!("Found {} tracks to index", tracks.len());
    println!("This may take a while...\n");

    let builder = IndexBuilder::new(open_cache(config)?, open_store(config));
    let report = builder.build(&tracks).context("Index build failed")?;

    println!("\n✓ Indexed {} tracks", report.indexed);
    if !report.skipped.is_empty() {
        println!("✗ Skipped {} tracks:", report.skipped.len());
        for skipped in &report.skipped {
            println!("    {}: {}", skipped.path.display(), skipped.reason);
        }
    }
    println!("  Build:     {}", report.manifest.build_id);
    println!("  Dimension: {}", report.manifest.dimension);
    println!("  Index:     {}", builder.store().dir().display());

    Ok(())
}
