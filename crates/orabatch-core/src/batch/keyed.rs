//! Batch executor for explicit argument collections

use std::num::NonZeroUsize;

use crate::batch::bind_failure;
use crate::{BatchError, BatchStatement, ParameterizedBinder, Result, RowCounts};

/// Executes one row per argument object in chunks of a per-call size,
/// independent of any template-wide send-batch size.
///
/// The chunk size is clamped to the number of arguments so the driver never
/// gets a threshold larger than the data available. Row counts come back as
/// one array per chunk, in chunk order.
#[derive(Debug, Clone, Copy)]
pub struct KeyedBatchExecutor {
    chunk_size: NonZeroUsize,
}

impl KeyedBatchExecutor {
    /// Fails with [`BatchError::Configuration`] when `chunk_size` is 0.
    pub fn new(chunk_size: usize) -> Result<Self> {
        NonZeroUsize::new(chunk_size)
            .map(|chunk_size| Self { chunk_size })
            .ok_or_else(|| BatchError::invalid_batch_size(chunk_size))
    }

    /// Chunk size actually used for `argument_count` arguments
    pub fn effective_chunk_size(&self, argument_count: usize) -> usize {
        self.chunk_size.get().min(argument_count)
    }

    pub async fn execute<T: Sync>(
        &self,
        statement: &mut dyn BatchStatement,
        arguments: &[T],
        binder: &mut dyn ParameterizedBinder<T>,
    ) -> Result<Vec<RowCounts>> {
        let chunk_size = self.effective_chunk_size(arguments.len());
        if chunk_size == 0 {
            return Ok(Vec::new());
        }

        let mut row_counts = Vec::with_capacity(arguments.len().div_ceil(chunk_size));
        for (chunk_index, chunk) in arguments.chunks(chunk_size).enumerate() {
            statement.set_batch_threshold(chunk.len()).await?;
            tracing::trace!(chunk = chunk_index, rows = chunk.len(), "executing driver batch");

            let mut chunk_counts = vec![0; chunk.len()];
            for (offset, argument) in chunk.iter().enumerate() {
                let row = chunk_index * chunk_size + offset;
                binder
                    .bind(statement, argument)
                    .map_err(|e| bind_failure(row, e))?;
                chunk_counts[offset] = statement.execute_one().await?;
            }
            row_counts.push(chunk_counts);
        }

        tracing::debug!(
            rows = arguments.len(),
            chunks = row_counts.len(),
            chunk_size,
            "keyed batch executed"
        );
        Ok(row_counts)
    }
}
