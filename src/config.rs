use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::DEFAULT_TTL;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub traversal: TraversalSettings,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Remote object repository (OData service) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    /// OData service root, e.g. `https://host/odata`.
    pub odata_url: String,
    /// Workspace used when a command does not name one.
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_username_env")]
    pub username_env: String,
    #[serde(default = "default_password_env")]
    pub password_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// `$top` for list queries.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

/// Traversal bounds and cache tuning
#[derive(Debug, Clone, Deserialize)]
pub struct TraversalSettings {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_objects_per_level")]
    pub max_objects_per_level: usize,
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Sibling subtrees explored at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Minimum spacing between per-ID object lookups.
    #[serde(default = "default_lookup_delay_ms")]
    pub lookup_delay_ms: u64,
}

impl Default for TraversalSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_objects_per_level: default_max_objects_per_level(),
            cache_enabled: true,
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
            max_concurrency: default_max_concurrency(),
            lookup_delay_ms: default_lookup_delay_ms(),
        }
    }
}

impl TraversalSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn lookup_delay(&self) -> Duration {
        Duration::from_millis(self.lookup_delay_ms)
    }
}

/// Saved-run storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_api_key_env() -> String {
    "RELGRAPH_API_KEY".to_string()
}

fn default_username_env() -> String {
    "RELGRAPH_USERNAME".to_string()
}

fn default_password_env() -> String {
    "RELGRAPH_PASSWORD".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> usize {
    1000
}

fn default_max_depth() -> usize {
    5
}

fn default_max_objects_per_level() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_max_concurrency() -> usize {
    4
}

fn default_lookup_delay_ms() -> u64 {
    100
}

fn default_db_path() -> PathBuf {
    PathBuf::from("relgraph.db")
}

fn default_key_prefix() -> String {
    "traversal".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Credentials resolved from the environment at client construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Basic { username: String, password: String },
    None,
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in RELGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = std::env::var("RELGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::from_file(&config_path)
    }

    /// Load and validate a specific config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.repository.odata_url.trim().is_empty() {
            anyhow::bail!("repository.odata_url must not be empty");
        }

        url::Url::parse(&self.repository.odata_url).with_context(|| {
            format!(
                "repository.odata_url is not a valid URL: {}",
                self.repository.odata_url
            )
        })?;

        if self.repository.page_size == 0 {
            anyhow::bail!("repository.page_size must be greater than 0");
        }

        if self.traversal.max_depth == 0 {
            anyhow::bail!("traversal.max_depth must be greater than 0");
        }

        if self.traversal.max_concurrency == 0 {
            anyhow::bail!("traversal.max_concurrency must be greater than 0");
        }

        if self.traversal.cache_capacity == 0 {
            anyhow::bail!("traversal.cache_capacity must be greater than 0");
        }

        Ok(())
    }

    /// Resolve repository credentials: API key first, then username/password.
    pub fn credentials(&self) -> Credentials {
        if let Ok(key) = std::env::var(&self.repository.api_key_env) {
            if !key.is_empty() {
                return Credentials::Bearer(key);
            }
        }
        match (
            std::env::var(&self.repository.username_env),
            std::env::var(&self.repository.password_env),
        ) {
            (Ok(username), Ok(password)) if !username.is_empty() => {
                Credentials::Basic { username, password }
            }
            _ => Credentials::None,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.storage.db_path
    }
}
