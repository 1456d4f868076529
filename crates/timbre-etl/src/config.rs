use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use timbre_core::ExtractionProfile;

use crate::cache::CacheKey;

/// Configuration for timbre.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (TIMBRE_* prefix)
/// 3. Config file (~/.config/timbre/config.toml)
/// 4. Built-in defaults (lowest priority)
///
/// It is built once at process start and handed to every component; nothing
/// in the pipeline reads a hard-coded path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root for all data directories that are not set explicitly.
    ///
    /// Can be set via:
    /// - CLI: --data-dir /path
    /// - ENV: TIMBRE_DATA_DIR
    /// - Config: data_dir = "/path"
    /// - Default: ~/.local/share/timbre
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Library scanned by `timbre build`. Default: `<data_dir>/music_db`.
    #[serde(default)]
    pub music_dir: Option<PathBuf>,

    /// Directory relative query paths are resolved against.
    /// Default: `<data_dir>/input`.
    #[serde(default)]
    pub input_dir: Option<PathBuf>,

    /// Embedding cache location. Default: `<data_dir>/embeddings_cache`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Index, identifier list and manifest. Default: `<data_dir>/index`.
    #[serde(default)]
    pub index_dir: Option<PathBuf>,

    /// How tracks map to cache entries: "content-hash" or "file-name".
    #[serde(default)]
    pub cache_key: CacheKey,

    /// Number of recommendations returned when none is requested.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Number of tracks drawn by `timbre random`.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// File extensions picked up when scanning the library.
    #[serde(default = "default_library_extensions")]
    pub library_extensions: Vec<String>,

    /// Listen address for `timbre serve`.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Extraction settings; changing any of them invalidates cached
    /// embeddings and requires a rebuild.
    #[serde(default)]
    pub extraction: ExtractionProfile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            music_dir: None,
            input_dir: None,
            cache_dir: None,
            index_dir: None,
            cache_key: CacheKey::default(),
            default_top_k: default_top_k(),
            sample_size: default_sample_size(),
            library_extensions: default_library_extensions(),
            bind_address: default_bind_address(),
            extraction: ExtractionProfile::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/timbre/config.toml
    /// Reads environment variables with TIMBRE_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or if
    /// the resulting configuration is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path(), "timbre")
    }

    /// Load from an explicit config file and environment prefix.
    fn load_from(config_path: &Path, env_prefix: &str) -> Result<Self> {
        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level(env_prefix);
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration with a custom data root.
    ///
    /// This is used when the --data-dir CLI flag is provided.
    pub fn load_with_data_dir(data_dir: PathBuf) -> Result<Self> {
        Ok(Self::load()?.with_data_dir(data_dir))
    }

    /// Replace the data root, keeping explicitly set directories.
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data_dir = data_dir;
        self
    }

    /// Reject settings no component can work with.
    pub fn validate(&self) -> Result<()> {
        self.extraction
            .validate()
            .context("Invalid [extraction] settings")?;
        if self.default_top_k == 0 {
            anyhow::bail!("default_top_k must be at least 1");
        }
        if self.library_extensions.is_empty() {
            anyhow::bail!("library_extensions must not be empty");
        }
        Ok(())
    }

    pub fn music_dir(&self) -> PathBuf {
        self.resolve(self.music_dir.as_ref(), "music_db")
    }

    pub fn input_dir(&self) -> PathBuf {
        self.resolve(self.input_dir.as_ref(), "input")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.resolve(self.cache_dir.as_ref(), "embeddings_cache")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.resolve(self.index_dir.as_ref(), "index")
    }

    fn resolve(&self, explicit: Option<&PathBuf>, default_name: &str) -> PathBuf {
        explicit
            .cloned()
            .unwrap_or_else(|| self.data_dir.join(default_name))
    }
}

/// Get the default data root.
///
/// Returns: ~/.local/share/timbre (or platform equivalent)
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timbre")
}

const fn default_top_k() -> usize {
    5
}

const fn default_sample_size() -> usize {
    5
}

fn default_library_extensions() -> Vec<String> {
    vec!["mp3".to_string()]
}

fn default_bind_address() -> String {
    "127.0.0.1:8000".to_string()
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/timbre/config.toml
/// - macOS: ~/Library/Application Support/timbre/config.toml
/// - Windows: %APPDATA%\timbre\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timbre")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Timbre Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (TIMBRE_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Root directory for library, cache and index data.
#
# Can also be set via:
# - CLI: timbre --data-dir /custom/path build
# - Environment: TIMBRE_DATA_DIR=/custom/path
#
# Default: Platform-specific data directory
#data_dir = "/path/to/timbre"

# Individual directories default to subdirectories of data_dir.
#music_dir = "/path/to/timbre/music_db"
#input_dir = "/path/to/timbre/input"
#cache_dir = "/path/to/timbre/embeddings_cache"
#index_dir = "/path/to/timbre/index"

# Cache entry naming: "content-hash" (default) or "file-name".
# "file-name" reuses one entry for same-named files in different folders.
#cache_key = "content-hash"

#default_top_k = 5
#sample_size = 5
#library_extensions = ["mp3"]
#bind_address = "127.0.0.1:8000"

# Extraction settings. Every cached embedding and every index is stamped
# with these; after changing them, rebuild with `timbre build`.
[extraction]
# "spectral" (embedding_size: any even number) or "chroma" (embedding_size: 32)
model = "spectral"
sample_rate = 22050
embedding_size = 128
version = 1
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.data_dir.as_os_str().is_empty());
        assert_eq!(config.cache_key, CacheKey::ContentHash);
        assert_eq!(config.default_top_k, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_directories_default_under_data_dir() {
        let config = Config {
            data_dir: PathBuf::from("/srv/timbre"),
            ..Config::default()
        };
        assert_eq!(config.music_dir(), PathBuf::from("/srv/timbre/music_db"));
        assert_eq!(config.input_dir(), PathBuf::from("/srv/timbre/input"));
        assert_eq!(config.cache_dir(), PathBuf::from("/srv/timbre/embeddings_cache"));
        assert_eq!(config.index_dir(), PathBuf::from("/srv/timbre/index"));
    }

    #[test]
    fn test_explicit_directory_wins() {
        let config = Config {
            data_dir: PathBuf::from("/srv/timbre"),
            cache_dir: Some(PathBuf::from("/fast/cache")),
            ..Config::default()
        };
        assert_eq!(config.cache_dir(), PathBuf::from("/fast/cache"));
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        assert_eq!(config.extraction, ExtractionProfile::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let config = Config {
            default_top_k: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    // Nothing sets variables under this prefix, so only the file is read.
    const UNSET_PREFIX: &str = "timbre_unit_test_unset";

    #[test]
    fn test_config_load_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("absent.toml"), UNSET_PREFIX).unwrap();
        assert_eq!(config.default_top_k, 5);
        assert_eq!(config.extraction, ExtractionProfile::default());
    }

    #[test]
    fn test_config_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "data_dir = \"/srv/timbre\"\ndefault_top_k = 12\n\n[extraction]\nembedding_size = 64\n",
        )
        .unwrap();

        let config = Config::load_from(&path, UNSET_PREFIX).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/timbre"));
        assert_eq!(config.default_top_k, 12);
        assert_eq!(config.extraction.embedding_size, 64);
    }

    #[test]
    fn test_config_load_rejects_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "default_top_k = 0\n").unwrap();

        assert!(Config::load_from(&path, UNSET_PREFIX).is_err());
    }

    #[test]
    fn test_config_with_custom_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "data_dir = \"/srv/timbre\"\ncache_dir = \"/fast/cache\"\n").unwrap();

        let custom = PathBuf::from("/tmp/timbre-test");
        let config = Config::load_from(&path, UNSET_PREFIX)
            .unwrap()
            .with_data_dir(custom.clone());
        assert_eq!(config.data_dir, custom);
        assert_eq!(config.index_dir(), custom.join("index"));
        assert_eq!(config.cache_dir(), PathBuf::from("/fast/cache"));
    }
}
