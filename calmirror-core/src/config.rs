//! Global calmirror configuration.

use std::path::{Path, PathBuf};

use chrono::Duration;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::cache::{
    CacheSettings, DEFAULT_LEASE_MINUTES, DEFAULT_REFRESH_INTERVAL_MINUTES,
    refresh_interval_from_minutes,
};
use crate::error::{MirrorError, MirrorResult};

static DEFAULT_DATA_DIR: &str = "~/.local/share/calmirror";

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_refresh_interval() -> i64 {
    DEFAULT_REFRESH_INTERVAL_MINUTES
}

fn default_lease_minutes() -> i64 {
    DEFAULT_LEASE_MINUTES
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_id() -> u32 {
    1
}

/// Configuration at ~/.config/calmirror/config.toml
///
/// Any key can be overridden with a `CALMIRROR_`-prefixed environment
/// variable (e.g. `CALMIRROR_DATA_DIR`).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MirrorConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Minutes before a mirrored account is considered stale.
    #[serde(default = "default_refresh_interval")]
    pub default_refresh_interval: i64,

    /// Minutes a refresh lease keeps other processes away.
    #[serde(default = "default_lease_minutes")]
    pub lease_minutes: i64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_id")]
    pub context: u32,

    #[serde(default = "default_id")]
    pub user: u32,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        MirrorConfig {
            data_dir: default_data_dir(),
            default_refresh_interval: default_refresh_interval(),
            lease_minutes: default_lease_minutes(),
            log_level: default_log_level(),
            context: default_id(),
            user: default_id(),
        }
    }
}

impl MirrorConfig {
    pub fn config_path() -> MirrorResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| MirrorError::Config("Could not determine config directory".into()))?
            .join("calmirror");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the global config, writing a commented default file on first use.
    pub fn load() -> MirrorResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> MirrorResult<Self> {
        Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(Environment::with_prefix("CALMIRROR"))
            .build()
            .map_err(|e| MirrorError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| MirrorError::Config(e.to_string()))
    }

    /// `data_dir` with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir.to_string_lossy()).into_owned())
    }

    pub fn cache_settings(&self) -> CacheSettings {
        let defaults = CacheSettings::default();
        CacheSettings {
            default_refresh_interval: refresh_interval_from_minutes(
                self.default_refresh_interval,
                defaults.default_refresh_interval,
            ),
            lease_duration: Some(self.lease_minutes)
                .filter(|minutes| *minutes > 0)
                .and_then(Duration::try_minutes)
                .unwrap_or(defaults.lease_duration),
        }
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> MirrorResult<()> {
        let contents = format!(
            "\
# calmirror configuration

# Where mirrored accounts and events live:
# data_dir = \"{}\"

# Minutes before a mirrored calendar is refreshed from its source:
# default_refresh_interval = {}

# Minutes a refresh lease keeps other processes from refreshing:
# lease_minutes = {}

# Log level (overridden by RUST_LOG):
# log_level = \"warn\"

# Default context and user ids:
# context = 1
# user = 1
",
            DEFAULT_DATA_DIR, DEFAULT_REFRESH_INTERVAL_MINUTES, DEFAULT_LEASE_MINUTES
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MirrorError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| MirrorError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}
