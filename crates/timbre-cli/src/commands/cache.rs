use anyhow::Result;
use timbre_etl::Config;

use super::open_cache;

pub fn show_stats(config: &Config) -> Result<()> {
    let cache = open_cache(config)?;
    let stats = cache.stats()?;

    println!("\nEmbedding cache\n");
    println!("  Directory: {}", cache.dir().display());
    println!("  Key:       {:?}", config.cache_key);
    println!("  Entries:   {}", stats.entries);
    println!("  Stale:     {}", stats.stale);
    println!("  Size:      {} bytes", stats.total_bytes);

    if stats.stale > 0 {
        println!("\n  Run `timbre cache prune` to remove stale entries");
    }

    Ok(())
}

pub fn prune(config: &Config) -> Result<()> {
    let removed = open_cache(config)?.prune()?;
    println!("✓ Removed {} stale cache entries", removed);
    Ok(())
}
