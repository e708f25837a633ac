//! Batch executors
//!
//! Three ways of splitting a logical batch into driver batches:
//!
//! - [`FixedBatchExecutor`]: known row count, chunks of the send-batch size
//! - [`InterruptibleBatchExecutor`]: unknown row count, one running driver
//!   batch with an explicit flush of the trailing partial group
//! - [`KeyedBatchExecutor`]: explicit argument objects, chunks of a per-call
//!   size, row counts grouped per chunk

mod fixed;
mod interruptible;
mod keyed;


pub use fixed::FixedBatchExecutor;
pub use interruptible::InterruptibleBatchExecutor;
pub use keyed::KeyedBatchExecutor;

use std::num::NonZeroUsize;
use std::ops::Range;

use crate::BatchError;

/// Split `0..total` into consecutive ranges of `chunk_size` rows.
///
/// All ranges are complete except possibly the last, which holds the
/// remainder `total % chunk_size`. Yields nothing when `total` is 0.
pub fn chunk_ranges(total: usize, chunk_size: NonZeroUsize) -> impl Iterator<Item = Range<usize>> {
    let size = chunk_size.get();
    (0..total)
        .step_by(size)
        .map(move |start| start..total.min(start + size))
}

/// Attribute a binder failure to its row unless it already is a driver error.
pub(crate) fn bind_failure(row: usize, err: BatchError) -> BatchError {
    if err.is_execution_failure() {
        err
    } else {
        BatchError::Bind {
            row,
            message: err.to_string(),
        }
    }
}
