//! SQLite target for orabatch
//!
//! SQLite has no driver-side update batching, so [`SqliteBatchStatement`]
//! queues activations itself and runs a queue in one transaction when it
//! reaches the batch threshold or is flushed.

mod connection;
mod statement;

#[cfg(test)]
mod connection_tests;
#[cfg(test)]
mod statement_tests;

pub use connection::SqliteDataSource;
pub use statement::{SqliteBatchStatement, SqliteCancelHandle};
