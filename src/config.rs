use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::download::paths::clean_filename;
use crate::flickr::Credentials;
use crate::types::DeleteScope;

/// Application configuration.
pub struct Config {
    pub username: String,
    pub album: Option<String>,
    pub sentinel_album: String,
    pub save_dir: Option<PathBuf>,
    pub database: PathBuf,
    pub credentials: Credentials,

    pub timeout: Duration,
    pub max_photos: usize,

    pub delete: Option<DeleteScope>,

    pub save_all: bool,
    pub assume_yes: bool,
    pub no_progress_bar: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("username", &self.username)
            .field("album", &self.album)
            .field("save_dir", &self.save_dir)
            .field("database", &self.database)
            .field("credentials", &self.credentials)
            .field("delete", &self.delete)
            .field("max_photos", &self.max_photos)
            .finish_non_exhaustive()
    }
}

/// Credentials file, keyed the way Flickr's developer pages name them.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct KeysFile {
    #[serde(rename = "API_KEY")]
    pub api_key: Option<String>,
    #[serde(rename = "API_SECRET")]
    pub api_secret: Option<String>,
    #[serde(rename = "OAUTH_TOKEN")]
    pub oauth_token: Option<String>,
    #[serde(rename = "OAUTH_TOKEN_SECRET")]
    pub oauth_token_secret: Option<String>,
}

impl KeysFile {
    /// Load the keys file, or an empty one when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("No keys file at {}", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read keys file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse keys file {}", path.display()))
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn default_database(username: &str) -> PathBuf {
    expand_tilde("~/.flickr-orphans").join(format!("{}.db", clean_filename(username)))
}

impl Config {
    pub fn from_cli(cli: crate::cli::Cli) -> anyhow::Result<Self> {
        let keys = KeysFile::load(&expand_tilde(&cli.keys_file))?;

        let api_key = cli
            .api_key
            .or(keys.api_key)
            .filter(|k| !k.is_empty())
            .context("No Flickr API key: pass --api-key, set FLICKR_API_KEY or add API_KEY to the keys file")?;
        let api_secret = cli
            .api_secret
            .or(keys.api_secret)
            .filter(|s| !s.is_empty())
            .context("No Flickr API secret: pass --api-secret, set FLICKR_API_SECRET or add API_SECRET to the keys file")?;
        let credentials = Credentials {
            api_key,
            api_secret,
            oauth_token: cli.oauth_token.or(keys.oauth_token),
            oauth_token_secret: cli.oauth_token_secret.or(keys.oauth_token_secret),
        };

        let delete = if cli.delete_all {
            Some(DeleteScope::All)
        } else if cli.delete {
            Some(DeleteScope::Orphans)
        } else {
            None
        };
        if delete.is_some()
            && (credentials.oauth_token.is_none() || credentials.oauth_token_secret.is_none())
        {
            anyhow::bail!(
                "Deleting requires OAuth credentials: set OAUTH_TOKEN and OAUTH_TOKEN_SECRET"
            );
        }

        let database = cli
            .database
            .map(|d| expand_tilde(&d))
            .unwrap_or_else(|| default_database(&cli.user));

        Ok(Self {
            album: cli.album,
            sentinel_album: cli.sentinel_album,
            save_dir: cli.save.map(|d| expand_tilde(&d)),
            database,
            credentials,
            timeout: Duration::from_secs(cli.timeout_secs),
            max_photos: cli.max_photos,
            delete,
            save_all: cli.save_all,
            assume_yes: cli.yes,
            no_progress_bar: cli.no_progress_bar,
            username: cli.user,
        })
    }
}
