use anyhow::Result;
use timbre_etl::Config;

use super::{open_cache, open_store};

pub fn show_status(config: &Config) -> Result<()> {
    let store = open_store(config);
    let cache = open_cache(config)?;
    let active = config.extraction.stamp();

    println!("\n📊 Timbre Status\n");
    println!("  Music:   {}", config.music_dir().display());
    println!("  Input:   {}", config.input_dir().display());
    println!("  Index:   {}", store.dir().display());
    println!("  Profile: {} ({:016x})", config.extraction.canonical(), active);

    match store.manifest() {
        Ok(manifest) => {
            println!("\n  Build:     {}", manifest.build_id);
            println!("  Built at:  {}", manifest.built_at);
            println!("  Tracks:    {}", manifest.count);
            println!("  Dimension: {}", manifest.dimension);
            if manifest.profile_stamp != format!("{active:016x}") {
                println!("\n  Index was built with other extraction settings; run `timbre build`");
            }
        }
        Err(e) if e.is_not_found() => {
            println!("\n  No index yet. Run `timbre build` to create one");
        }
        Err(e) => return Err(e.into()),
    }

    let stats = cache.stats()?;
    println!("\n  Cached embeddings: {} ({} stale)", stats.entries, stats.stale);

    Ok(())
}
