use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use timbre_core::codec::decode_embedding;
use timbre_etl::Config;

use super::open_cache;

pub fn run_inspect(config: &Config, file: &Path, preview: usize) -> Result<()> {
    let entry = entry_for(config, file)?;
    let bytes =
        std::fs::read(&entry).with_context(|| format!("Failed to read {}", entry.display()))?;
    let stored = decode_embedding(&entry, &bytes)?;
    let active = config.extraction.stamp();

    println!("Entry:     {}", entry.display());
    println!(
        "Stamp:     {:016x}{}",
        stored.stamp,
        if stored.stamp == active {
            ""
        } else {
            " (stale: computed under other extraction settings)"
        }
    );
    println!("Dimension: {}", stored.values.len());

    let shown = preview.min(stored.values.len());
    println!("First {} values:", shown);
    for (i, value) in stored.values.iter().take(shown).enumerate() {
        println!("  [{i}] {value:.6}");
    }

    Ok(())
}

/// A `.emb` file is used as is; anything else is treated as a track and
/// mapped to its cache entry.
fn entry_for(config: &Config, file: &Path) -> Result<PathBuf> {
    if file.extension().is_some_and(|ext| ext == "emb") {
        return Ok(file.to_path_buf());
    }
    let entry = open_cache(config)?
        .entry_path(file)
        .with_context(|| format!("Failed to locate cache entry for {}", file.display()))?;
    if !entry.is_file() {
        anyhow::bail!(
            "{} has no cache entry (expected {}); run `timbre build` first",
            file.display(),
            entry.display()
        );
    }
    Ok(entry)
}
