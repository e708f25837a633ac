//! Orabatch Drivers - batch targets and data source wiring
//!
//! This crate re-exports the per-driver crates behind cargo features and
//! turns a [`DataSourceConfig`] into a ready [`BatchTemplate`].

#[cfg(feature = "oracle")]
pub use orabatch_driver_oracle as oracle;
#[cfg(feature = "sqlite")]
pub use orabatch_driver_sqlite as sqlite;

mod registry;
mod runtime;

pub use registry::{DataSourceOpener, DataSourceRegistry};
pub use runtime::{block_on_tokio, get_tokio_runtime};

/// Re-export commonly used types from orabatch-core
pub use orabatch_core::{
    BatchBinder, BatchConfig, BatchError, BatchStatement, BatchTemplate, DataSourceConfig,
    FnArgBinder, FnBinder, InterruptibleBinder, IterBinder, ParameterDisposer,
    ParameterizedBinder, Result, RowCounts, RowsBinder, SendBatchSize, StatementSource, Value,
    ValuesBinder,
};

use std::sync::Arc;

/// Open the data source described by `config` with the built-in drivers.
///
/// Fails with [`BatchError::Configuration`] when the driver is unknown or
/// not compiled in.
pub fn open_data_source(config: &DataSourceConfig) -> Result<Arc<dyn StatementSource>> {
    DataSourceRegistry::with_defaults().open(config)
}

/// Build a template from `config`, opening its data source if one is configured.
pub fn template_from_config(config: &BatchConfig) -> Result<BatchTemplate> {
    let source = config
        .data_source
        .as_ref()
        .map(open_data_source)
        .transpose()?;
    BatchTemplate::from_config(config, source)
}
