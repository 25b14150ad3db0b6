//! Application configuration management.
//!
//! This module handles loading and saving the configuration, which holds the
//! profile API base URL and token, timing settings and storage locations.
//!
//! Configuration is stored at `~/.config/tagcache/config.json`. The
//! `TAGCACHE_API_URL` and `TAGCACHE_API_TOKEN` environment variables take
//! precedence over the file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::refresh::DEFAULT_REFRESH_INTERVAL;

/// Application name used for config/data directory paths
const APP_NAME: &str = "tagcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "https://api.cr-api.com/profile/";

pub const ENV_API_URL: &str = "TAGCACHE_API_URL";
pub const ENV_API_TOKEN: &str = "TAGCACHE_API_TOKEN";

/// Which schema the API returns, used to render snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    #[default]
    Player,
    Band,
}

impl FromStr for ProfileKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "player" => Ok(ProfileKind::Player),
            "band" => Ok(ProfileKind::Band),
            other => bail!("Unknown profile kind '{}' (expected 'player' or 'band')", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefix the normalized tag is appended to.
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub profile_kind: ProfileKind,
    pub request_timeout_secs: u64,
    pub refresh_interval_secs: u64,
    pub data_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
            profile_kind: ProfileKind::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL.as_secs(),
            data_dir: None,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where scope documents live.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(token) = lookup(ENV_API_TOKEN).filter(|v| !v.is_empty()) {
            self.api_token = Some(token);
        }
    }

    /// Update one setting by its command-line name.
    pub fn set(&mut self, field: &str, value: &str) -> Result<()> {
        match field {
            "api-url" => {
                if value.is_empty() {
                    bail!("API URL cannot be empty");
                }
                self.api_base_url = value.to_string();
            }
            "token" => {
                self.api_token = if value.is_empty() { None } else { Some(value.to_string()) };
            }
            "kind" => self.profile_kind = value.parse()?,
            "timeout" => self.request_timeout_secs = parse_positive_secs(field, value)?,
            "interval" => self.refresh_interval_secs = parse_positive_secs(field, value)?,
            "data-dir" => self.data_dir = Some(PathBuf::from(value)),
            "log-dir" => self.log_dir = Some(PathBuf::from(value)),
            other => bail!("Unknown setting '{}'", other),
        }
        Ok(())
    }
}

fn parse_positive_secs(field: &str, value: &str) -> Result<u64> {
    let secs: u64 = value
        .parse()
        .with_context(|| format!("{} must be a number of seconds", field))?;
    if secs == 0 {
        bail!("{} must be greater than zero", field);
    }
    Ok(secs)
}
