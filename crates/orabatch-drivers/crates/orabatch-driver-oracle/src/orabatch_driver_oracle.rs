//! Oracle target for orabatch
//!
//! Activations are queued client side and sent as one ODPI-C array DML
//! execution per driver batch, so a batch of `n` rows costs one round trip.
//! The Oracle client libraries are loaded at runtime when the first
//! connection is made.

mod connection;
mod statement;

#[cfg(test)]
mod statement_tests;

pub use connection::{OracleConnectOptions, OracleDataSource};
pub use statement::{OracleBatchStatement, OracleCancelHandle};
