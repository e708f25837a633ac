//! Driver statement surface used by the batch executors

use crate::{Result, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// Handle for cancelling a running batch from any thread.
///
/// The handle is safe to call from any thread and can be called multiple
/// times (subsequent calls are no-ops). An interrupted execute or flush
/// fails with [`crate::BatchError::Cancelled`].
pub trait QueryCancelHandle: Send + Sync {
    /// Cancel the operation currently running on the associated statement.
    fn cancel(&self);
}

/// A prepared DML statement with driver-level update batching.
///
/// Activations are queued by [`execute_one`](BatchStatement::execute_one)
/// until the queue reaches the batch threshold, at which point the driver
/// sends the whole queue in one round trip. Implemented once per target
/// driver; the executors never look past this trait.
#[async_trait]
pub trait BatchStatement: Send {
    /// SQL text the statement was prepared from
    fn sql(&self) -> &str;

    /// Set how many queued activations trigger an implicit flush.
    ///
    /// `threshold` is at least 1. Activations still queued under the old
    /// threshold are flushed first.
    async fn set_batch_threshold(&mut self, threshold: usize) -> Result<()>;

    /// Current batch threshold
    fn batch_threshold(&self) -> usize;

    /// Stage a parameter of the current activation (1-based position)
    fn set_param(&mut self, position: usize, value: Value) -> Result<()>;

    /// Queue the current activation.
    ///
    /// Returns 0 while the queue is below the threshold, and the aggregate
    /// affected-row count of the queue when this activation fills it.
    async fn execute_one(&mut self) -> Result<u64>;

    /// Send every queued activation and return their aggregate affected-row
    /// count (0 when nothing is queued).
    async fn flush_remaining(&mut self) -> Result<u64>;

    /// Number of queued, unsent activations
    fn pending(&self) -> usize;

    /// Get a handle that can be used to cancel a running execute or flush.
    ///
    /// Returns `None` if the driver does not support cancellation.
    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        None
    }

    /// Release the statement. Activations that were never flushed are discarded.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Something that can prepare batch statements, usually a connection.
#[async_trait]
pub trait StatementSource: Send + Sync {
    /// Get the driver name (e.g., "sqlite", "oracle")
    fn driver_name(&self) -> &str;

    /// Check if the underlying connection is closed
    fn is_closed(&self) -> bool;

    /// Prepare `sql` for batched execution
    async fn prepare_batch(&self, sql: &str) -> Result<Box<dyn BatchStatement>>;
}
