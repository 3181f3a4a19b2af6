use clap::Parser;

use crate::classify::DEFAULT_SENTINEL_ALBUM;
use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "flickr-orphans",
    version,
    about = "Find Flickr photos that are in no album, then save or delete them"
)]
pub struct Cli {
    /// Flickr username
    #[arg(short = 'u', long)]
    pub user: String,

    /// Scan this album instead of the whole photostream
    #[arg(short = 'a', long)]
    pub album: Option<String>,

    /// Album whose sole membership still counts as unorganized
    #[arg(long, default_value = DEFAULT_SENTINEL_ALBUM)]
    pub sentinel_album: String,

    /// Save orphaned photos (and lookup failures) to this directory
    #[arg(short = 's', long)]
    pub save: Option<String>,

    /// Save every fetched photo, not just orphans
    #[arg(long, requires = "save")]
    pub save_all: bool,

    /// Delete orphaned photos from Flickr
    #[arg(long)]
    pub delete: bool,

    /// Delete every fetched photo from Flickr
    #[arg(long, conflicts_with = "delete")]
    pub delete_all: bool,

    /// Do not ask before deleting
    #[arg(long)]
    pub yes: bool,

    /// Stop after this many photos (0 = no limit)
    #[arg(short = 'm', long, default_value_t = 0)]
    pub max_photos: usize,

    /// SQLite database file (default: ~/.flickr-orphans/<user>.db)
    #[arg(short = 'd', long)]
    pub database: Option<String>,

    /// TOML file with API_KEY, API_SECRET, OAUTH_TOKEN and OAUTH_TOKEN_SECRET
    #[arg(long, default_value = "flickr_keys.toml")]
    pub keys_file: String,

    /// Flickr API key (overrides the keys file)
    #[arg(long, env = "FLICKR_API_KEY")]
    pub api_key: Option<String>,

    /// Flickr API secret (overrides the keys file)
    #[arg(long, env = "FLICKR_API_SECRET", hide_env_values = true)]
    pub api_secret: Option<String>,

    /// OAuth access token, needed for deleting
    #[arg(long, env = "FLICKR_OAUTH_TOKEN", hide_env_values = true)]
    pub oauth_token: Option<String>,

    /// OAuth access token secret, needed for deleting
    #[arg(long, env = "FLICKR_OAUTH_TOKEN_SECRET", hide_env_values = true)]
    pub oauth_token_secret: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress_bar: bool,
}
