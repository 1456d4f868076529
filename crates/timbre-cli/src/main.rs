use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use timbre_etl::Config;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "timbre", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root for library, cache and index data (default: ~/.local/share/timbre)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Embed every track in the music library and rebuild the index
    ///
    /// Walks the music directory for files with a configured extension
    /// (library_extensions, default: mp3), resolves each through the
    /// embedding cache, and replaces the index, identifier list and manifest
    /// in the index directory.
    ///
    /// Files that cannot be decoded are reported and left out. Cached
    /// embeddings computed under different extraction settings are
    /// recomputed. Only one build may run at a time per index directory.
    Build {
        /// Music library to index (default: <data_dir>/music_db)
        #[arg(long)]
        music_dir: Option<PathBuf>,
    },
    /// List indexed tracks that sound most like FILE
    Recommend {
        /// Query track, relative to the input directory unless absolute
        file: PathBuf,

        /// Number of recommendations (default: default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Pick random tracks from the index
    Random {
        /// Number of tracks (default: sample_size)
        #[arg(short)]
        n: Option<usize>,
    },
    /// Show a cached embedding
    ///
    /// FILE is either a `.emb` cache entry or an audio track whose entry is
    /// looked up in the cache.
    Inspect {
        file: PathBuf,

        /// Number of leading values to print
        #[arg(long, default_value_t = 5)]
        preview: usize,
    },
    /// Inspect or prune the embedding cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Extract MP3 audio from video files with ffmpeg
    Convert {
        /// Directory holding video files
        #[arg(long)]
        input: PathBuf,

        /// Directory for the MP3 files (created if missing)
        #[arg(long)]
        output: PathBuf,

        /// ffmpeg binary to run
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: PathBuf,
    },
    /// Serve recommendations over HTTP
    Serve {
        /// Listen address (default: bind_address)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Show index and cache status
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum CacheAction {
    /// Count cache entries and stale entries
    Stats,
    /// Delete entries computed under other extraction settings
    Prune,
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print one value, or the whole config file when no key is given
    Get { key: Option<String> },
    /// Set a value in the config file
    Set { key: String, value: String },
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file if it does not exist
    Init,
}

fn load_config(data_dir: Option<PathBuf>) -> Result<Config> {
    match data_dir {
        Some(dir) => Config::load_with_data_dir(dir),
        None => Config::load(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();

    let data_dir = cli.data_dir;
    match cli.command {
        Commands::Build { music_dir } => commands::run_build(&load_config(data_dir)?, music_dir)?,
        Commands::Recommend { file, top_k, json } => {
            commands::run_recommend(&load_config(data_dir)?, &file, top_k, json)?;
        }
        Commands::Random { n } => commands::run_random(&load_config(data_dir)?, n)?,
        Commands::Inspect { file, preview } => {
            commands::run_inspect(&load_config(data_dir)?, &file, preview)?;
        }
        Commands::Cache { action } => {
            let config = load_config(data_dir)?;
            match action {
                CacheAction::Stats => commands::cache::show_stats(&config)?,
                CacheAction::Prune => commands::cache::prune(&config)?,
            }
        }
        Commands::Convert {
            input,
            output,
            ffmpeg,
        } => commands::run_convert(&input, &output, &ffmpeg)?,
        Commands::Serve { bind } => commands::run_serve(&load_config(data_dir)?, bind).await?,
        Commands::Status => commands::show_status(&load_config(data_dir)?)?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(&load_config(data_dir)?),
            ConfigAction::Get { key } => commands::config::get_config(key, data_dir)?,
            ConfigAction::Set { key, value } => commands::config::set_config(&key, &value)?,
            ConfigAction::Path => commands::config::show_path(),
            ConfigAction::Example => commands::config::show_example(),
            ConfigAction::Init => commands::config::init_config()?,
        },
    }

    Ok(())
}
