//! Batch statement emulating Oracle update batching on SQLite

use async_trait::async_trait;
use orabatch_core::{
    Activation, ActivationQueue, BatchError, BatchStatement, QueryCancelHandle, Result, Value,
};
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection as RusqliteConnection, ErrorCode, InterruptHandle, params_from_iter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cancel handle for SQLite batches.
///
/// Interrupts the statement currently running on the connection and marks
/// the batch cancelled, so an execute or flush that has not started yet
/// fails as well.
pub struct SqliteCancelHandle {
    interrupt_handle: Arc<InterruptHandle>,
    cancelled: Arc<AtomicBool>,
}

impl SqliteCancelHandle {
    pub(crate) fn new(interrupt_handle: Arc<InterruptHandle>) -> Self {
        Self {
            interrupt_handle,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl QueryCancelHandle for SqliteCancelHandle {
    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::debug!("interrupting SQLite batch");
        }
        self.interrupt_handle.interrupt();
    }
}

/// A prepared DML statement with a client-side activation queue.
///
/// Activations are queued by `execute_one` and run together, inside one
/// savepoint, when the queue reaches the batch threshold or on
/// `flush_remaining`. A failing queue is rolled back as a unit.
pub struct SqliteBatchStatement {
    conn: Arc<Mutex<RusqliteConnection>>,
    interrupt_handle: Arc<InterruptHandle>,
    cancelled: Arc<AtomicBool>,
    sql: String,
    queue: ActivationQueue<SqlValue>,
}

impl SqliteBatchStatement {
    pub(crate) fn new(
        conn: Arc<Mutex<RusqliteConnection>>,
        interrupt_handle: Arc<InterruptHandle>,
        sql: &str,
        parameter_count: usize,
    ) -> Self {
        Self {
            conn,
            interrupt_handle,
            cancelled: Arc::new(AtomicBool::new(false)),
            sql: sql.to_string(),
            queue: ActivationQueue::new(parameter_count),
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(BatchError::Cancelled);
        }
        Ok(())
    }

    fn send(&self, rows: Vec<Activation<SqlValue>>) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.check_cancelled()?;
        run_batch(&self.conn, &self.sql, rows)
    }
}

#[async_trait]
impl BatchStatement for SqliteBatchStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    async fn set_batch_threshold(&mut self, threshold: usize) -> Result<()> {
        let queued = self.queue.set_threshold(threshold)?;
        self.send(queued)?;
        Ok(())
    }

    fn batch_threshold(&self) -> usize {
        self.queue.threshold()
    }

    fn set_param(&mut self, position: usize, value: Value) -> Result<()> {
        self.queue.stage(position, value_to_rusqlite(&value))
    }

    async fn execute_one(&mut self) -> Result<u64> {
        self.check_cancelled()?;
        match self.queue.push() {
            Some(full) => self.send(full),
            None => Ok(0),
        }
    }

    async fn flush_remaining(&mut self) -> Result<u64> {
        self.check_cancelled()?;
        let queued = self.queue.drain();
        self.send(queued)
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(SqliteCancelHandle {
            interrupt_handle: Arc::clone(&self.interrupt_handle),
            cancelled: Arc::clone(&self.cancelled),
        }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if !self.queue.is_empty() {
            tracing::warn!(
                pending = self.queue.len(),
                "closing SQLite batch statement with unsent activations"
            );
        }
        Ok(())
    }
}

/// Run every activation of one driver batch inside a savepoint.
fn run_batch(
    conn: &Mutex<RusqliteConnection>,
    sql: &str,
    rows: Vec<Activation<SqlValue>>,
) -> Result<u64> {
    let row_count = rows.len();
    let mut conn = conn.lock();
    let savepoint = conn.savepoint().map_err(map_sqlite_error)?;
    let mut affected = 0u64;
    {
        let mut stmt = savepoint.prepare_cached(sql).map_err(map_sqlite_error)?;
        for row in rows {
            let params = row.into_iter().map(|v| v.unwrap_or(SqlValue::Null));
            affected += stmt
                .execute(params_from_iter(params))
                .map_err(map_sqlite_error)? as u64;
        }
    }
    savepoint.commit().map_err(map_sqlite_error)?;
    tracing::debug!(rows = row_count, affected_rows = affected, "flushed SQLite batch");
    Ok(affected)
}

pub(crate) fn map_sqlite_error(e: rusqlite::Error) -> BatchError {
    match e.sqlite_error_code() {
        Some(ErrorCode::OperationInterrupted) => BatchError::Cancelled,
        _ => BatchError::Query(format!("Failed to execute batch: {}", e)),
    }
}

/// Convert our Value types to rusqlite-compatible types
pub(crate) fn value_to_rusqlite(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(if *b { 1 } else { 0 }),
        Value::Int32(i) => SqlValue::Integer(*i as i64),
        Value::Int64(i) => SqlValue::Integer(*i),
        Value::Float64(f) => SqlValue::Real(*f),
        Value::Decimal(d) => SqlValue::Text(d.clone()),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::Uuid(u) => SqlValue::Text(u.to_string()),
        Value::Date(d) => SqlValue::Text(d.to_string()),
        Value::DateTime(dt) => SqlValue::Text(dt.to_string()),
        Value::DateTimeUtc(dt) => {
            SqlValue::Text(dt.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
        }
        Value::Json(j) => SqlValue::Text(j.to_string()),
    }
}
