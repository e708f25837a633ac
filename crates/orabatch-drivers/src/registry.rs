//! Registry of data source openers, keyed by driver name

use orabatch_core::{BatchError, DataSourceConfig, Result, StatementSource};
use std::collections::HashMap;
use std::sync::Arc;

/// Opens a data source from its configuration
pub type DataSourceOpener =
    Arc<dyn Fn(&DataSourceConfig) -> Result<Arc<dyn StatementSource>> + Send + Sync>;

/// Registry of available data source drivers
pub struct DataSourceRegistry {
    openers: HashMap<String, DataSourceOpener>,
}

impl DataSourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            openers: HashMap::new(),
        }
    }

    /// Create a registry with all built-in drivers registered
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "sqlite")]
        registry.register("sqlite", Arc::new(open_sqlite));
        #[cfg(feature = "oracle")]
        registry.register("oracle", Arc::new(open_oracle));

        registry
    }

    /// Register an opener, replacing any previous one for `driver`
    pub fn register(&mut self, driver: &str, opener: DataSourceOpener) {
        let name = driver.to_lowercase();
        tracing::debug!(driver = %name, "registering data source driver");
        self.openers.insert(name, opener);
    }

    /// Open the data source described by `config`
    pub fn open(&self, config: &DataSourceConfig) -> Result<Arc<dyn StatementSource>> {
        let name = config.driver.to_lowercase();
        let Some(opener) = self.openers.get(&name) else {
            tracing::warn!(driver = %name, "driver not found in registry");
            return Err(BatchError::Configuration(format!(
                "Unknown data source driver '{}' (available: {})",
                config.driver,
                self.list().join(", ")
            )));
        };
        opener(config)
    }

    /// List all registered driver names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.openers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check if a driver is registered
    pub fn has(&self, name: &str) -> bool {
        self.openers.contains_key(&name.to_lowercase())
    }
}

impl Default for DataSourceRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &DataSourceConfig) -> Result<Arc<dyn StatementSource>> {
    let source = crate::sqlite::SqliteDataSource::open(&config.database)?;
    Ok(Arc::new(source))
}

#[cfg(feature = "oracle")]
fn open_oracle(config: &DataSourceConfig) -> Result<Arc<dyn StatementSource>> {
    let username = config.username.clone().ok_or_else(|| {
        BatchError::Configuration("Oracle data source requires a username".into())
    })?;
    let options = crate::oracle::OracleConnectOptions::new(
        username,
        config.password.clone().unwrap_or_default(),
        config.database.clone(),
    );
    let source = crate::oracle::OracleDataSource::connect(&options)?;
    Ok(Arc::new(source))
}
