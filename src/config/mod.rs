//! Configuration module
//!
//! `config.toml` lives in `.meeseeks/` (project-local, found by walking up
//! from the current directory) or in the platform config dir (global).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Project-local directory name
pub const LOCAL_DIR: &str = ".meeseeks";
pub const CONFIG_FILE: &str = "config.toml";
pub const DATABASE_FILE: &str = "cache.db";

/// Overrides `api.base_url`
pub const ENV_API_URL: &str = "MEESEEKS_API_URL";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub crawl: CrawlConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

/// Remote catalog API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pages followed per filtered search
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_pages: default_max_pages(),
        }
    }
}

fn default_base_url() -> String {
    "https://rickandmortyapi.com/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_pages() -> usize {
    50
}

/// Crawl pacing and guards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Pause between episode fetches
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Episodes per committed batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_episodes")]
    pub max_episodes: usize,

    /// Consecutive retries of a transient failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            batch_size: default_batch_size(),
            max_episodes: default_max_episodes(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_delay_ms() -> u64 {
    5000
}

fn default_batch_size() -> usize {
    1
}

fn default_max_episodes() -> usize {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Database file; unset means `.meeseeks/cache.db` or the global data dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

impl Config {
    /// Load config, preferring an explicit file (`--config` / `MEESEEKS_CONFIG`)
    pub fn load_with(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match Self::source(explicit)? {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };

        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                config.api.base_url = url;
            }
        }

        Ok(config)
    }

    /// Config file that `load_with` reads, if any
    pub fn source(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Some(path.to_path_buf()));
        }

        if let Some(local) = Self::find_local_config() {
            return Ok(Some(local));
        }

        Ok(Self::global_config_path().filter(|p| p.exists()))
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Find local .meeseeks/config.toml walking up directories
    pub fn find_local_config() -> Option<PathBuf> {
        find_up(CONFIG_FILE)
    }

    /// Find local .meeseeks/cache.db walking up directories
    pub fn find_local_db() -> Option<PathBuf> {
        find_up(DATABASE_FILE)
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "meeseeks")
    }

    /// Global config path (platform config dir)
    pub fn global_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|d| d.config_dir().join(CONFIG_FILE))
    }

    /// Global database path (platform data dir)
    pub fn global_db_path() -> Option<PathBuf> {
        Self::project_dirs().map(|d| d.data_dir().join(DATABASE_FILE))
    }

    /// Database path with priority:
    /// 1. `--db` / MEESEEKS_DATABASE
    /// 2. `store.database`
    /// 3. Local .meeseeks/cache.db (walking up from CWD)
    /// 4. Global data dir
    pub fn database_path(&self, explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }

        if let Some(path) = &self.store.database {
            return path.clone();
        }

        if let Some(local_db) = Self::find_local_db() {
            return local_db;
        }

        // local .meeseeks/ exists without a database yet
        if let Some(dir) = Self::find_local_config().and_then(|c| c.parent().map(Path::to_path_buf)) {
            return dir.join(DATABASE_FILE);
        }

        if let Some(global) = Self::global_db_path() {
            return global;
        }

        PathBuf::from(LOCAL_DIR).join(DATABASE_FILE)
    }
}

fn find_up(file: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(LOCAL_DIR).join(file);
        if candidate.exists() {
            return Some(candidate);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "https://rickandmortyapi.com/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.crawl.delay_ms, 5000);
        assert_eq!(config.crawl.batch_size, 1);
        assert_eq!(config.crawl.max_episodes, 10_000);
        assert_eq!(config.crawl.max_retries, 3);
        assert!(config.store.database.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[crawl]\ndelay_ms = 250\n")?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.crawl.delay_ms, 250);
        assert_eq!(config.crawl.batch_size, 1);
        assert_eq!(config.api.max_pages, 50);
        Ok(())
    }

    #[test]
    fn test_save_and_reload() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(LOCAL_DIR).join(CONFIG_FILE);

        let mut config = Config::default();
        config.store.database = Some(PathBuf::from("/tmp/rnm.db"));
        config.save_to(&path)?;

        let loaded = Config::load_from(&path)?;
        assert_eq!(loaded.store.database, Some(PathBuf::from("/tmp/rnm.db")));
        assert_eq!(loaded.database_path(None), PathBuf::from("/tmp/rnm.db"));
        assert_eq!(
            loaded.database_path(Some(Path::new("other.db"))),
            PathBuf::from("other.db")
        );
        Ok(())
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        assert!(Config::source(Some(Path::new("/nonexistent/meeseeks.toml"))).is_err());
    }
}
