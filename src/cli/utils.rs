//! CLI utility functions
//!
//! Resolves config and database location once per command and hands out the
//! store and the API client.

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use super::GlobalArgs;
use crate::config::Config;
use crate::core::storage::Store;
use crate::remote::CatalogClient;

/// Loaded configuration for one command
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub db_path: PathBuf,
}

impl Context {
    /// Load config (`--config` / env / discovery) and pick the database path
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let config = Config::load_with(global.config.as_deref())?;
        let db_path = config.database_path(global.db.as_deref());
        tracing::debug!(db = %db_path.display(), api = %config.api.base_url, "context loaded");
        Ok(Self { config, db_path })
    }

    /// Open the cache, creating its directory if needed
    pub fn open_store(&self) -> Result<Store> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        Store::open(&self.db_path)
    }

    pub fn client(&self) -> Result<CatalogClient> {
        CatalogClient::from_config(&self.config.api)
    }
}
