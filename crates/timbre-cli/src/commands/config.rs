use anyhow::{Context, Result};
use std::path::PathBuf;
use timbre_etl::{config, Config};
use toml_edit::{value, Array, DocumentMut};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Text,
    Integer,
    List,
}

/// Keys accepted by `config get` and `config set`.
const KEYS: &[(&str, Kind)] = &[
    ("data_dir", Kind::Text),
    ("music_dir", Kind::Text),
    ("input_dir", Kind::Text),
    ("cache_dir", Kind::Text),
    ("index_dir", Kind::Text),
    ("cache_key", Kind::Text),
    ("default_top_k", Kind::Integer),
    ("sample_size", Kind::Integer),
    ("library_extensions", Kind::List),
    ("bind_address", Kind::Text),
    ("extraction.model", Kind::Text),
    ("extraction.sample_rate", Kind::Integer),
    ("extraction.embedding_size", Kind::Integer),
    ("extraction.version", Kind::Integer),
];

fn kind_of(key: &str) -> Result<Kind> {
    KEYS.iter()
        .find(|(name, _)| *name == key)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| {
            let valid: Vec<&str> = KEYS.iter().map(|(name, _)| *name).collect();
            anyhow::anyhow!("Unknown config key: {}\n\nValid keys: {}", key, valid.join(", "))
        })
}

/// Show the current effective configuration.
pub fn show_config(config: &Config) {
    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config::config_file_path().display());

    let exists = config::config_file_path().exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    println!("  data_dir: {}", config.data_dir.display());
    println!("  music_dir: {}", config.music_dir().display());
    println!("  input_dir: {}", config.input_dir().display());
    println!("  cache_dir: {}", config.cache_dir().display());
    println!("  index_dir: {}", config.index_dir().display());
    println!("  cache_key: {:?}", config.cache_key);
    println!("  default_top_k: {}", config.default_top_k);
    println!("  sample_size: {}", config.sample_size);
    println!("  library_extensions: {}", config.library_extensions.join(", "));
    println!("  bind_address: {}", config.bind_address);
    println!("  extraction: {}", config.extraction.canonical());
    println!("  extraction stamp: {:016x}", config.extraction.stamp());

    println!("\nPriority: CLI args > ENV vars (TIMBRE_*) > Config file > Defaults");
}

/// Get a specific config value, or print the config file.
pub fn get_config(key: Option<String>, data_dir: Option<PathBuf>) -> Result<()> {
    let Some(key) = key else {
        let config_path = config::config_file_path();
        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            print!("{}", contents);
        } else {
            println!("Config file does not exist: {}", config_path.display());
            println!("\nRun 'timbre config init' to create it.");
        }
        return Ok(());
    };

    kind_of(&key)?;
    let config = match data_dir {
        Some(dir) => Config::load_with_data_dir(dir)?,
        None => Config::load()?,
    };

    match key.as_str() {
        "data_dir" => println!("{}", config.data_dir.display()),
        "music_dir" => println!("{}", config.music_dir().display()),
        "input_dir" => println!("{}", config.input_dir().display()),
        "cache_dir" => println!("{}", config.cache_dir().display()),
        "index_dir" => println!("{}", config.index_dir().display()),
        _ => {
            let settings = serde_json::to_value(&config)?;
            let pointer = format!("/{}", key.replace('.', "/"));
            match settings.pointer(&pointer) {
                Some(serde_json::Value::String(s)) => println!("{}", s),
                Some(other) => println!("{}", other),
                None => println!("<not set>"),
            }
        }
    }

    Ok(())
}

/// Set a config value in the config file, keeping its comments.
pub fn set_config(key: &str, raw: &str) -> Result<()> {
    let kind = kind_of(key)?;
    let config_path = config::config_file_path();

    config::ensure_config_file()?;
    let previous = std::fs::read_to_string(&config_path).context("Failed to read config file")?;
    let mut doc: DocumentMut = previous
        .parse()
        .with_context(|| format!("Failed to parse {}", config_path.display()))?;

    let item = match kind {
        Kind::Text => value(raw),
        Kind::Integer => value(
            raw.parse::<i64>()
                .with_context(|| format!("{} expects an integer, got {:?}", key, raw))?,
        ),
        Kind::List => value(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Array>(),
        ),
    };

    match key.split_once('.') {
        Some((table, field)) => doc[table][field] = item,
        None => doc[key] = item,
    }

    std::fs::write(&config_path, doc.to_string()).context("Failed to write config file")?;

    // Reject values the loader cannot use and put the old file back.
    if let Err(e) = Config::load() {
        std::fs::write(&config_path, previous).context("Failed to restore config file")?;
        return Err(e.context(format!("Invalid value for {}", key)));
    }

    println!("✓ Updated {} = {}", key, raw);
    println!("  in {}", config_path.display());

    Ok(())
}

/// Show the config file path.
pub fn show_path() {
    println!("{}", config::config_file_path().display());
}

/// Show example configuration.
pub fn show_example() {
    print!("{}", config::example_config());
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure timbre.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_keys() {
        assert_eq!(kind_of("default_top_k").unwrap(), Kind::Integer);
        assert_eq!(kind_of("extraction.model").unwrap(), Kind::Text);
        assert_eq!(kind_of("library_extensions").unwrap(), Kind::List);
        assert!(kind_of("acoustid_api_key").is_err());
    }

    #[test]
    fn test_nested_edit_keeps_comments() {
        let mut doc: DocumentMut = config::example_config().parse().unwrap();
        doc["extraction"]["embedding_size"] = value(64_i64);
        doc["default_top_k"] = value(10_i64);

        let edited = doc.to_string();
        assert!(edited.contains("# Timbre Configuration File"));
        assert!(edited.contains("embedding_size = 64"));
        assert!(edited.contains("default_top_k = 10"));
    }
}
