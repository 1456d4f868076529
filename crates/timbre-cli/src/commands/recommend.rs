use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use timbre_core::Recommendation;
use timbre_etl::tags::read_tags;
use timbre_etl::Config;

use super::open_recommender;

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub recommend: Vec<Recommendation>,
}

/// Relative query paths are taken from the input directory.
pub fn resolve_query(input_dir: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        input_dir.join(file)
    }
}

pub fn run_recommend(config: &Config, file: &Path, top_k: Option<usize>, json: bool) -> Result<()> {
    let query = resolve_query(&config.input_dir(), file);
    let top_k = top_k.unwrap_or(config.default_top_k);

    let recommendations = open_recommender(config)?
        .recommend(&query, top_k)
        .with_context(|| format!("Failed to recommend for {}", query.display()))?;

    if json {
        let response = RecommendResponse {
            recommend: recommendations,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("\nTracks similar to {}\n", query.display());
    for (rank, rec) in recommendations.iter().enumerate() {
        println!(
            "  {:>2}. {:<40} {:>10.4}",
            rank + 1,
            rec.identifier.file_name(),
            rec.distance
        );
        println!("      {}", read_tags(rec.identifier.path()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_query() {
        let input = Path::new("/data/input");
        assert_eq!(
            resolve_query(input, Path::new("song.mp3")),
            PathBuf::from("/data/input/song.mp3")
        );
        assert_eq!(
            resolve_query(input, Path::new("/elsewhere/song.mp3")),
            PathBuf::from("/elsewhere/song.mp3")
        );
    }

    #[test]
    fn test_response_shape() {
        let response = RecommendResponse {
            recommend: vec![Recommendation {
                identifier: timbre_core::TrackId::new("/m/a.mp3"),
                distance: 0.5,
            }],
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["recommend"][0]["identifier"], "/m/a.mp3");
        assert_eq!(value["recommend"][0]["distance"], 0.5);
    }
}
