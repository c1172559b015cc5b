// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Project configuration management.
//!
//! Configuration is stored in `.tally/config.toml` and includes:
//! - `api_url`: Base URL of the remote API (e.g., "http://localhost:3000/api")
//! - `database`: Optional path for the local database
//! - `[sync]`: Probe and request timing

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tally_core::EntityKind;

use crate::error::{Error, Result};

const WORK_DIR_NAME: &str = ".tally";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "tally.db";
const LOG_FILE_NAME: &str = "tally.log";
const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Project configuration stored in `.tally/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the remote API. Entity URLs are `<api_url>/<collection>[/<id>]`.
    pub api_url: String,
    /// Optional path for the database (relative to `.tally/` or absolute).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Timing knobs for the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Reachability probe period in milliseconds (default: 5000).
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// Per-request HTTP timeout in seconds (default: 10).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_probe_interval_ms() -> u64 {
    5_000
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            probe_interval_ms: default_probe_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SyncSettings {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Checks that `url` is an absolute http(s) URL.
///
/// Returns an error message if the URL is invalid.
pub fn validate_api_url(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => None,
        Some(_) => Some(format!("invalid API URL '{}': missing host", url)),
        None => Some(format!(
            "invalid API URL '{}': must start with http:// or https://",
            url
        )),
    }
}

impl Config {
    /// Creates a new config pointing at `api_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL is not an http(s) URL.
    pub fn new(api_url: &str) -> Result<Self> {
        if let Some(reason) = validate_api_url(api_url) {
            return Err(Error::Config(reason));
        }
        Ok(Config {
            api_url: api_url.trim_end_matches('/').to_string(),
            database: None,
            sync: SyncSettings::default(),
        })
    }

    /// Loads configuration from the given `.tally/` directory.
    pub fn load(work_dir: &Path) -> Result<Self> {
        let config_path = work_dir.join(CONFIG_FILE_NAME);
        let content = fs::read_to_string(&config_path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        if let Some(reason) = validate_api_url(&config.api_url) {
            return Err(Error::Config(reason));
        }
        Ok(config)
    }

    /// Saves configuration to the given `.tally/` directory.
    pub fn save(&self, work_dir: &Path) -> Result<()> {
        let config_path = work_dir.join(CONFIG_FILE_NAME);
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    /// URL of an entity's collection.
    pub fn collection_url(&self, entity: EntityKind) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), entity.collection())
    }
}

/// Find the .tally directory by walking up from the current directory
pub fn find_work_dir() -> Result<PathBuf> {
    let mut current = std::env::current_dir()?;
    loop {
        let work_dir = current.join(WORK_DIR_NAME);
        if work_dir.join(CONFIG_FILE_NAME).is_file() {
            return Ok(work_dir);
        }
        if !current.pop() {
            return Err(Error::NotInitialized);
        }
    }
}

/// Get the database path from config
pub fn get_db_path(work_dir: &Path, config: &Config) -> PathBuf {
    match &config.database {
        Some(database) => {
            let path = Path::new(database);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                work_dir.join(path)
            }
        }
        None => work_dir.join(DB_FILE_NAME),
    }
}

/// Get the log file path for a work directory.
pub fn get_log_path(work_dir: &Path) -> PathBuf {
    work_dir.join(LOG_FILE_NAME)
}

/// Initialize a new .tally directory at the given path
pub fn init_work_dir(path: &Path, api_url: &str, database: Option<&str>) -> Result<PathBuf> {
    let work_dir = path.join(WORK_DIR_NAME);

    if work_dir.join(CONFIG_FILE_NAME).exists() {
        return Err(Error::AlreadyInitialized(work_dir.display().to_string()));
    }

    let mut config = Config::new(api_url)?;
    config.database = database.map(String::from);

    fs::create_dir_all(&work_dir)?;
    config.save(&work_dir)?;
    write_gitignore(&work_dir)?;

    Ok(work_dir)
}

/// Write a .gitignore file to the work directory.
///
/// Ignores the default database (with its WAL files) and the log.
pub fn write_gitignore(work_dir: &Path) -> Result<()> {
    let content = format!(
        "# Local data\n{DB_FILE_NAME}\n{DB_FILE_NAME}-wal\n{DB_FILE_NAME}-shm\n\n\
         # Logs\n{LOG_FILE_NAME}\n"
    );
    fs::write(work_dir.join(GITIGNORE_FILE_NAME), content)?;
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
