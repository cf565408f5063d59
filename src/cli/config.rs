//! `meeseeks config` command
//!
//! Get or set configuration values.
//!
//! # Usage
//! ```bash
//! meeseeks config                       # Show the active config file
//! meeseeks config crawl.delay_ms        # Get specific value
//! meeseeks config crawl.delay_ms 1000   # Set value
//! meeseeks config --path                # Where config files live
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use super::{GlobalArgs, Outcome};
use crate::config::{Config, CONFIG_FILE, LOCAL_DIR};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Config key (e.g., crawl.delay_ms, api.base_url)
    pub key: Option<String>,

    /// Value to set
    pub value: Option<String>,

    /// List all config values
    #[arg(long)]
    pub list: bool,

    /// Show config file paths
    #[arg(long)]
    pub path: bool,

    /// Use the global config instead of the local one
    #[arg(short, long)]
    pub global: bool,
}

fn local_config_path() -> PathBuf {
    Config::find_local_config().unwrap_or_else(|| PathBuf::from(LOCAL_DIR).join(CONFIG_FILE))
}

fn config_path(global: &GlobalArgs, args: &ConfigArgs) -> Result<PathBuf> {
    if let Some(explicit) = &global.config {
        return Ok(explicit.clone());
    }
    if args.global {
        return Config::global_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine the user config directory"));
    }
    Ok(local_config_path())
}

pub fn run(global: &GlobalArgs, args: ConfigArgs) -> Result<Outcome> {
    let config_path = config_path(global, &args)?;

    if args.path {
        match Config::global_config_path() {
            Some(path) => println!("Global: {}", path.display()),
            None => println!("Global: (unavailable)"),
        }
        println!("Local:  {}", local_config_path().display());
        println!();
        if config_path.exists() {
            println!("{} Active: {}", "✓".green(), config_path.display());
        } else {
            println!("{} No config file at {}", "!".yellow(), config_path.display());
        }
        return Ok(Outcome::Done);
    }

    if args.list || args.key.is_none() {
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            println!("{} ({}):\n", "Configuration".bold(), config_path.display());
            println!("{}", content);
        } else {
            println!("No config file at {}", config_path.display());
            println!("\nDefaults in effect:\n");
            println!("{}", toml::to_string_pretty(&Config::default())?);
        }
        return Ok(Outcome::Done);
    }

    if let Some(key) = &args.key {
        if let Some(value) = &args.value {
            set_config_value(&config_path, key, value)?;
            println!(
                "{} {} = {} (in {})",
                "Set".green(),
                key,
                value,
                config_path.display()
            );
        } else {
            match get_config_value(&config_path, key)? {
                Some(v) => println!("{}", v),
                None => println!("(not set)"),
            }
        }
    }

    Ok(Outcome::Done)
}

/// Set a nested config value using dot notation (e.g., "crawl.delay_ms")
///
/// Formatting and comments in the file are preserved. The edit is refused if
/// the result no longer loads as a valid config.
fn set_config_value(path: &Path, key: &str, val: &str) -> Result<()> {
    use toml_edit::{value, DocumentMut};

    let content = if path.exists() {
        fs::read_to_string(path)?
    } else {
        String::new()
    };

    let mut doc: DocumentMut = content.parse().context("Failed to parse config.toml")?;

    match key.split('.').collect::<Vec<_>>().as_slice() {
        [section, field] => {
            match doc.get(section) {
                None => doc[*section] = toml_edit::table(),
                Some(item) if item.as_table_like().is_none() => {
                    bail!("Cannot set {}: [{}] is not a table in {}", key, section, path.display())
                }
                Some(_) => {}
            }
            doc[*section][*field] = value(parse_toml_value(val));
        }
        _ => bail!("Invalid key: {}. Expected section.key (e.g. crawl.delay_ms)", key),
    }

    let updated = doc.to_string();
    toml::from_str::<Config>(&updated)
        .with_context(|| format!("Invalid value for {}: {}", key, val))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, updated)?;
    Ok(())
}

/// Get a config value by dot notation key
fn get_config_value(path: &Path, key: &str) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    let doc: toml::Table = content.parse().context("Failed to parse config.toml")?;

    let val = match key.split('.').collect::<Vec<_>>().as_slice() {
        [section, field] => doc.get(*section).and_then(|t| t.get(*field)),
        _ => None,
    };

    Ok(val.map(|v| match v {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }))
}

/// Parse string value to appropriate TOML type
fn parse_toml_value(s: &str) -> toml_edit::Value {
    if let Ok(b) = s.parse::<bool>() {
        return b.into();
    }
    if let Ok(i) = s.parse::<i64>() {
        return i.into();
    }
    if let Ok(f) = s.parse::<f64>() {
        return f.into();
    }
    s.into()
}
