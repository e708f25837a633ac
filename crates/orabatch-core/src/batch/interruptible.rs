//! Batch executor for row sources of unknown length

use crate::batch::bind_failure;
use crate::{BatchStatement, InterruptibleBinder, Result, RowCounts, SendBatchSize};

/// Streams rows into one running driver batch until the binder reports
/// exhaustion or its nominal ceiling is reached.
///
/// The threshold is set once to the send-batch size, so complete groups are
/// flushed by the driver as they fill. A trailing group shorter than the
/// threshold is sent with an explicit flush, and the flush result replaces
/// the provisional count of the last row.
///
/// The flush reports the aggregate of the whole trailing group, so when that
/// group holds more than one row the last entry carries the group total
/// rather than a per-row count.
#[derive(Debug, Clone, Copy)]
pub struct InterruptibleBatchExecutor {
    send_batch_size: SendBatchSize,
}

impl InterruptibleBatchExecutor {
    pub fn new(send_batch_size: SendBatchSize) -> Self {
        Self { send_batch_size }
    }

    pub async fn execute(
        &self,
        statement: &mut dyn BatchStatement,
        binder: &mut dyn InterruptibleBinder,
    ) -> Result<RowCounts> {
        let send_batch_size = self.send_batch_size.get();
        statement.set_batch_threshold(send_batch_size).await?;

        // Capacity is not taken from row_count(), which may be usize::MAX.
        let mut row_counts = RowCounts::new();
        let mut row = 0;
        while row < binder.row_count() {
            if binder.is_exhausted(row) {
                break;
            }
            binder
                .bind(statement, row)
                .map_err(|e| bind_failure(row, e))?;
            row_counts.push(statement.execute_one().await?);
            row += 1;
        }

        if row > 0 && row % send_batch_size != 0 {
            let flushed = statement.flush_remaining().await?;
            tracing::trace!(rows = row % send_batch_size, affected_rows = flushed, "flushed trailing group");
            if let Some(last) = row_counts.last_mut() {
                *last = flushed;
            }
        }

        tracing::debug!(rows = row, "interruptible batch executed");
        Ok(row_counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Event, RecordingStatement, init_tracing, numbered_rows};
    use crate::{BatchBinder, BatchError, IterBinder, Value};
    use pretty_assertions::assert_eq;

    fn executor(size: i64) -> InterruptibleBatchExecutor {
        InterruptibleBatchExecutor::new(SendBatchSize::new(size).unwrap())
    }

    #[tokio::test]
    async fn test_exhausted_at_seven_with_batches_of_five() {
        init_tracing();
        let mut stmt = RecordingStatement::new("INSERT INTO t VALUES (?1)");
        let mut binder = IterBinder::new(numbered_rows(7));

        let counts = executor(5).execute(&mut stmt, &mut binder).await.unwrap();

        assert_eq!(counts.len(), 7);
        // rows 5 and 6 were queued (provisional 0), the flush sends both
        assert_eq!(counts, vec![0, 0, 0, 0, 5, 0, 2]);
        assert_eq!(stmt.thresholds(), vec![5]);
        assert_eq!(stmt.flushes(), 1);
        assert_eq!(stmt.pending(), 0);
    }

    #[tokio::test]
    async fn test_exact_multiple_needs_no_flush() {
        let mut stmt = RecordingStatement::new("INSERT INTO t VALUES (?1)");
        let mut binder = IterBinder::new(numbered_rows(10));

        let counts = executor(5).execute(&mut stmt, &mut binder).await.unwrap();

        assert_eq!(counts, vec![0, 0, 0, 0, 5, 0, 0, 0, 0, 5]);
        assert_eq!(stmt.flushes(), 0);
    }

    #[tokio::test]
    async fn test_immediately_exhausted_binds_nothing() {
        let mut stmt = RecordingStatement::new("INSERT INTO t VALUES (?1)");
        let mut binder = IterBinder::new(Vec::<Vec<Value>>::new());

        let counts = executor(5).execute(&mut stmt, &mut binder).await.unwrap();

        assert!(counts.is_empty());
        assert_eq!(stmt.events(), &[Event::Threshold(5)]);
    }

    #[tokio::test]
    async fn test_nominal_ceiling_bounds_the_loop() {
        let mut stmt = RecordingStatement::new("INSERT INTO t VALUES (?1)");
        let mut binder = IterBinder::with_ceiling(numbered_rows(20), 3);

        let counts = executor(2).execute(&mut stmt, &mut binder).await.unwrap();

        assert_eq!(binder.row_count(), 3);
        assert_eq!(counts, vec![0, 2, 1]);
        assert_eq!(
            stmt.sent_keys(),
            vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)]
        );
    }

    #[tokio::test]
    async fn test_single_row_is_flushed() {
        let mut stmt = RecordingStatement::new("INSERT INTO t VALUES (?1)");
        let mut binder = IterBinder::new(numbered_rows(1));

        let counts = executor(100).execute(&mut stmt, &mut binder).await.unwrap();

        assert_eq!(counts, vec![1]);
        assert_eq!(stmt.flushes(), 1);
    }

    #[tokio::test]
    async fn test_flush_failure_is_propagated() {
        let mut stmt = RecordingStatement::new("INSERT INTO t VALUES (?1)").fail_flush();
        let mut binder = IterBinder::new(numbered_rows(3));

        let err = executor(2).execute(&mut stmt, &mut binder).await.unwrap_err();

        assert!(matches!(err, BatchError::Query(_)));
    }

    #[tokio::test]
    async fn test_cancellation_surfaces_as_failure() {
        let mut stmt = RecordingStatement::new("INSERT INTO t VALUES (?1)");
        let handle = stmt.cancel_handle().expect("recording statement is cancellable");
        handle.cancel();
        handle.cancel();
        let mut binder = IterBinder::new(numbered_rows(3));

        let err = executor(2).execute(&mut stmt, &mut binder).await.unwrap_err();

        assert!(matches!(err, BatchError::Cancelled));
        assert_eq!(stmt.flushes(), 0);
    }
}
