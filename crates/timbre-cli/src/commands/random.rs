use anyhow::{Context, Result};
use timbre_etl::Config;
use timbre_search::random_sample;

use super::open_store;

pub fn run_random(config: &Config, n: Option<usize>) -> Result<()> {
    let n = n.unwrap_or(config.sample_size);
    let tracks = random_sample(&open_store(config), n).context("Failed to sample the index")?;

    for track in tracks {
        println!("{track}");
    }

    Ok(())
}
