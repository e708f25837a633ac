//! Orabatch Core - send-batch splitting for bulk DML
//!
//! This crate holds the driver-agnostic half of orabatch. It defines:
//!
//! - `BatchStatement` / `StatementSource` - the driver surface, implemented
//!   once per target database
//! - `BatchBinder`, `InterruptibleBinder`, `ParameterizedBinder` - the caller
//!   side, binding one logical row at a time
//! - the fixed, interruptible and keyed executors in [`batch`]
//! - `BatchTemplate` - the facade that validates the send-batch size and
//!   disposes binders on every exit path
//! - `ActivationQueue` - the client-side queue adapters use to emulate
//!   Oracle update batching
//! - `BatchConfig` and common types like `Value` and `SendBatchSize`

pub mod batch;
mod binder;
mod config;
mod error;
mod queue;
mod statement;
mod template;
mod types;

#[cfg(test)]
mod test_support;

pub use batch::{FixedBatchExecutor, InterruptibleBatchExecutor, KeyedBatchExecutor};
pub use binder::{
    BatchBinder, FnArgBinder, FnBinder, InterruptibleBinder, IterBinder, ParameterDisposer,
    ParameterizedBinder, RowsBinder, ValuesBinder, bind_values,
};
pub use config::*;
pub use error::*;
pub use queue::{Activation, ActivationQueue};
pub use statement::*;
pub use template::*;
pub use types::*;
