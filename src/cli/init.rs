//! `meeseeks init` command
//!
//! Creates `.meeseeks/` with a default config and an empty cache.
//!
//! # Usage
//! ```bash
//! meeseeks init                    # Initialize in current directory
//! meeseeks init /path/to/project   # Initialize in specific path
//! meeseeks init --global           # Initialize the user-wide config and cache
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use clap::Args;
use colored::Colorize;

use super::Outcome;
use crate::config::{Config, CONFIG_FILE, DATABASE_FILE, LOCAL_DIR};
use crate::core::storage::Store;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to initialize (default: current directory)
    pub path: Option<PathBuf>,

    /// Initialize the global config and cache instead
    #[arg(long)]
    pub global: bool,

    /// Force re-initialization
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<Outcome> {
    let (config_path, db_path) = if args.global {
        let config = Config::global_config_path();
        let db = Config::global_db_path();
        match config.zip(db) {
            Some(paths) => paths,
            None => bail!("Could not determine the user config directory"),
        }
    } else {
        let dir = args
            .path
            .unwrap_or_else(|| PathBuf::from("."))
            .join(LOCAL_DIR);
        (dir.join(CONFIG_FILE), dir.join(DATABASE_FILE))
    };

    initialize(&config_path, &db_path, args.force)?;

    println!("{} meeseeks cache", "Initialized".green().bold());
    println!("   Config:   {}", config_path.display());
    println!("   Database: {}", db_path.display());
    println!("\nNext steps:");
    println!("  meeseeks crawl");
    println!("  meeseeks character Rick");

    Ok(Outcome::Done)
}

/// Write the default config and create the database schema
pub fn initialize(config_path: &Path, db_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists. Use --force to reinitialize.",
            config_path.display()
        );
    }

    for dir in [config_path.parent(), db_path.parent()].into_iter().flatten() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    Config::default().save_to(config_path)?;
    let _store = Store::open(db_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_creates_config_and_schema() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config_path = dir.path().join(LOCAL_DIR).join(CONFIG_FILE);
        let db_path = dir.path().join(LOCAL_DIR).join(DATABASE_FILE);

        initialize(&config_path, &db_path, false)?;

        let config = Config::load_from(&config_path)?;
        assert_eq!(config.crawl.delay_ms, 5000);
        assert_eq!(Store::open(&db_path)?.stats()?.episodes, 0);

        assert!(initialize(&config_path, &db_path, false).is_err());
        initialize(&config_path, &db_path, true)?;
        Ok(())
    }
}
