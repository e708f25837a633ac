//! Batch configuration
//!
//! Loaded from `<config dir>/orabatch/batch.toml` with environment overrides:
//!
//! ```toml
//! send_batch_size = 100
//! lazy_init = true
//! sql_preview_chars = 100
//!
//! [data_source]
//! driver = "sqlite"
//! database = ":memory:"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{BatchError, Result};

pub const SEND_BATCH_SIZE_ENV: &str = "ORABATCH_SEND_BATCH_SIZE";
pub const LAZY_INIT_ENV: &str = "ORABATCH_LAZY_INIT";

/// Send-batch size used when nothing is configured
pub const DEFAULT_SEND_BATCH_SIZE: i64 = 100;

/// Template-wide batch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Rows per driver batch. Kept signed so a non-positive value reaches
    /// template construction and fails there as a configuration error.
    pub send_batch_size: i64,
    /// When false, the data source is checked at template construction.
    pub lazy_init: bool,
    /// Maximum characters of SQL included in log events
    pub sql_preview_chars: usize,
    pub data_source: Option<DataSourceConfig>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            send_batch_size: DEFAULT_SEND_BATCH_SIZE,
            lazy_init: true,
            sql_preview_chars: 100,
            data_source: None,
        }
    }
}

/// Where a template gets its statements from
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Driver name, e.g. "sqlite" or "oracle"
    pub driver: String,
    /// File path for SQLite, connect string for Oracle
    pub database: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for DataSourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSourceConfig")
            .field("driver", &self.driver)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl BatchConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded batch configuration");
        Ok(config)
    }

    /// `<config dir>/orabatch/batch.toml`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("orabatch").join("batch.toml"))
    }

    /// Load the default file if it exists, then apply environment overrides.
    pub fn load_or_default() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(SEND_BATCH_SIZE_ENV) {
            self.send_batch_size = raw.trim().parse().map_err(|_| {
                BatchError::Configuration(format!(
                    "{} must be an integer, got {:?}",
                    SEND_BATCH_SIZE_ENV, raw
                ))
            })?;
        }
        if let Some(raw) = lookup(LAZY_INIT_ENV) {
            self.lazy_init = parse_flag(&raw).ok_or_else(|| {
                BatchError::Configuration(format!(
                    "{} must be true or false, got {:?}",
                    LAZY_INIT_ENV, raw
                ))
            })?;
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
