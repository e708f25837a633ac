//! Batch executor for binders with a known row count

use crate::batch::{bind_failure, chunk_ranges};
use crate::{BatchBinder, BatchStatement, Result, RowCounts, SendBatchSize};

/// Executes `M` rows as `M / S` complete driver batches of `S` rows followed
/// by one batch of the `M % S` remaining rows.
///
/// The driver threshold is set to the length of each chunk before its rows
/// are bound, so a short final chunk is flushed by its last activation
/// instead of waiting for rows that never come.
#[derive(Debug, Clone, Copy)]
pub struct FixedBatchExecutor {
    send_batch_size: SendBatchSize,
}

impl FixedBatchExecutor {
    pub fn new(send_batch_size: SendBatchSize) -> Self {
        Self { send_batch_size }
    }

    pub fn send_batch_size(&self) -> SendBatchSize {
        self.send_batch_size
    }

    /// Bind and execute every row of `binder`, returning one affected-row
    /// count per row in row order.
    pub async fn execute(
        &self,
        statement: &mut dyn BatchStatement,
        binder: &mut dyn BatchBinder,
    ) -> Result<RowCounts> {
        let total = binder.row_count();
        let mut row_counts = Vec::with_capacity(total);
        let mut chunks = 0;

        for rows in chunk_ranges(total, self.send_batch_size.as_non_zero()) {
            let len = rows.len();
            statement.set_batch_threshold(len).await?;
            tracing::trace!(chunk = chunks, start = rows.start, rows = len, "executing driver batch");

            for row in rows {
                binder
                    .bind(statement, row)
                    .map_err(|e| bind_failure(row, e))?;
                row_counts.push(statement.execute_one().await?);
            }
            chunks += 1;
        }

        tracing::debug!(rows = row_counts.len(), chunks, "fixed batch executed");
        Ok(row_counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Event, RecordingStatement, init_tracing, numbered_rows};
    use crate::{BatchError, FnBinder, RowsBinder, Value};
    use pretty_assertions::assert_eq;

    fn executor(size: i64) -> FixedBatchExecutor {
        FixedBatchExecutor::new(SendBatchSize::new(size).unwrap())
    }

    #[tokio::test]
    async fn test_ten_rows_in_chunks_of_three() {
        init_tracing();
        let mut stmt = RecordingStatement::new("INSERT INTO t VALUES (?1)");
        let mut binder = RowsBinder::new(numbered_rows(10));

        let counts = executor(3).execute(&mut stmt, &mut binder).await.unwrap();

        assert_eq!(counts.len(), 10);
        assert_eq!(stmt.thresholds(), vec![3, 3, 3, 1]);
        // queued activations report 0, the one that fills a chunk reports the chunk
        assert_eq!(counts, vec![0, 0, 3, 0, 0, 3, 0, 0, 3, 1]);
        assert_eq!(stmt.pending(), 0);
        assert_eq!(stmt.flushes(), 0);
    }

    #[tokio::test]
    async fn test_rows_are_sent_in_row_order() {
        let mut stmt = RecordingStatement::new("INSERT INTO t VALUES (?1)");
        let mut binder = RowsBinder::new(numbered_rows(7));

        executor(4).execute(&mut stmt, &mut binder).await.unwrap();

        let expected: Vec<Value> = (1..=7).map(Value::Int64).collect();
        assert_eq!(stmt.sent_keys(), expected);
        assert_eq!(stmt.thresholds(), vec![4, 3]);
    }

    #[tokio::test]
    async fn test_fewer_rows_than_send_batch_size() {
        let mut stmt = RecordingStatement::new("INSERT INTO t VALUES (?1)");
        let mut binder = RowsBinder::new(numbered_rows(2));

        let counts = executor(50).execute(&mut stmt, &mut binder).await.unwrap();

        assert_eq!(stmt.thresholds(), vec![2]);
        assert_eq!(counts, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_remainder_chunk() {
        let mut stmt = RecordingStatement::new("INSERT INTO t VALUES (?1)");
        let mut binder = RowsBinder::new(numbered_rows(6));

        let counts = executor(3).execute(&mut stmt, &mut binder).await.unwrap();

        assert_eq!(stmt.thresholds(), vec![3, 3]);
        assert_eq!(counts, vec![0, 0, 3, 0, 0, 3]);
    }

    #[tokio::test]
    async fn test_empty_batch_touches_nothing() {
        let mut stmt = RecordingStatement::new("INSERT INTO t VALUES (?1)");
        let mut binder = RowsBinder::new(Vec::new());

        let counts = executor(3).execute(&mut stmt, &mut binder).await.unwrap();

        assert!(counts.is_empty());
        assert!(stmt.events().is_empty());
    }

    #[tokio::test]
    async fn test_execute_failure_aborts_remaining_chunks() {
        let mut stmt = RecordingStatement::new("INSERT INTO t VALUES (?1)").fail_on_execute(4);
        let mut binder = RowsBinder::new(numbered_rows(10));

        let err = executor(3).execute(&mut stmt, &mut binder).await.unwrap_err();

        assert!(err.is_execution_failure());
        // second chunk started, nothing after the failing activation
        assert_eq!(stmt.thresholds(), vec![3, 3]);
        assert_eq!(
            stmt.events().iter().filter(|e| **e == Event::Execute).count(),
            5
        );
    }

    #[tokio::test]
    async fn test_binder_failure_is_attributed_to_row() {
        let mut stmt = RecordingStatement::new("INSERT INTO t VALUES (?1)");
        let mut binder = FnBinder::new(5, |stmt: &mut dyn BatchStatement, row: usize| {
            if row == 3 {
                return Err(BatchError::NotSupported("value type".into()));
            }
            stmt.set_param(1, Value::Int64(row as i64))
        });

        let err = executor(2).execute(&mut stmt, &mut binder).await.unwrap_err();

        assert!(matches!(err, BatchError::Bind { row: 3, .. }));
        assert!(err.is_execution_failure());
    }
}
