//! Batch statement over ODPI-C array DML

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use oracle::Connection;
use oracle::sql_type::ToSql;
use orabatch_core::{
    Activation, ActivationQueue, BatchError, BatchStatement, QueryCancelHandle, Result, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// ORA-01013: user requested cancel of current operation
const USER_CANCEL_CODE: &str = "ORA-01013";

/// Cancel handle for Oracle batches.
///
/// Breaks the call currently running on the session and marks the batch
/// cancelled, so an execute or flush that has not started yet fails too.
pub struct OracleCancelHandle {
    conn: Arc<Connection>,
    cancelled: Arc<AtomicBool>,
}

impl OracleCancelHandle {
    pub(crate) fn new(conn: Arc<Connection>) -> Self {
        Self {
            conn,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl QueryCancelHandle for OracleCancelHandle {
    fn cancel(&self) {
        cancel_with(&self.cancelled, || self.conn.break_execution());
    }
}

/// Mark `cancelled` and break the running call. The break is issued on every
/// call; only the first one is logged.
pub(crate) fn cancel_with<F>(cancelled: &AtomicBool, break_execution: F)
where
    F: FnOnce() -> oracle::Result<()>,
{
    if !cancelled.swap(true, Ordering::SeqCst) {
        tracing::debug!("breaking Oracle batch execution");
    }
    if let Err(e) = break_execution() {
        tracing::warn!(error = %e, "failed to break Oracle execution");
    }
}

/// A prepared DML statement whose driver batches are sent as array DML.
pub struct OracleBatchStatement {
    conn: Arc<Connection>,
    cancelled: Arc<AtomicBool>,
    sql: String,
    queue: ActivationQueue<Value>,
}

impl OracleBatchStatement {
    pub(crate) fn new(conn: Arc<Connection>, sql: &str, parameter_count: usize) -> Self {
        Self {
            conn,
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

    fn send(&self, rows: Vec<Activation<Value>>) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.check_cancelled()?;
        run_batch(&self.conn, &self.sql, rows)
    }
}

#[async_trait]
impl BatchStatement for OracleBatchStatement {
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
        self.queue.stage(position, value)
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
        Some(Arc::new(OracleCancelHandle {
            conn: Arc::clone(&self.conn),
            cancelled: Arc::clone(&self.cancelled),
        }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if !self.queue.is_empty() {
            tracing::warn!(
                pending = self.queue.len(),
                "closing Oracle batch statement with unsent activations"
            );
        }
        Ok(())
    }
}

/// Send one driver batch as a single array DML execution.
fn run_batch(conn: &Connection, sql: &str, rows: Vec<Activation<Value>>) -> Result<u64> {
    let row_count = rows.len();
    let mut batch = conn
        .batch(sql, row_count)
        .with_row_counts()
        .build()
        .map_err(map_oracle_error)?;

    // The first appended row fixes each column's bind type, so NULLs take
    // the type of the first non-null value in their column
    let kinds = column_kinds(&rows);

    // Sized to the rows at hand, so the last append fills the batch and executes it
    for row in &rows {
        let params: Vec<Box<dyn ToSql>> = row
            .iter()
            .zip(&kinds)
            .map(|(value, kind)| to_oracle_param(value.as_ref(), *kind))
            .collect();
        let refs: Vec<&dyn ToSql> = params.iter().map(|p| &**p).collect();
        batch.append_row(&refs).map_err(map_oracle_error)?;
    }

    let affected: u64 = batch.row_counts().map_err(map_oracle_error)?.iter().sum();
    tracing::debug!(rows = row_count, affected_rows = affected, "flushed Oracle batch");
    Ok(affected)
}

pub(crate) fn map_oracle_error(e: oracle::Error) -> BatchError {
    classify_oracle_error(&e.to_string())
}

pub(crate) fn classify_oracle_error(message: &str) -> BatchError {
    if message.contains(USER_CANCEL_CODE) {
        BatchError::Cancelled
    } else {
        BatchError::Query(format!("Oracle error: {}", message))
    }
}

/// Oracle type a NULL is bound with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NullKind {
    Varchar,
    Number,
    BinaryDouble,
    Raw,
    Date,
    Timestamp,
    TimestampTz,
}

impl NullKind {
    /// Kind matching a non-null value; text for NULL itself
    pub(crate) fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) | Value::Int32(_) | Value::Int64(_) => NullKind::Number,
            Value::Float64(_) => NullKind::BinaryDouble,
            Value::Bytes(_) => NullKind::Raw,
            Value::Date(_) => NullKind::Date,
            Value::DateTime(_) => NullKind::Timestamp,
            Value::DateTimeUtc(_) => NullKind::TimestampTz,
            Value::Null
            | Value::Decimal(_)
            | Value::String(_)
            | Value::Uuid(_)
            | Value::Json(_) => NullKind::Varchar,
        }
    }

    fn null_param(self) -> Box<dyn ToSql> {
        match self {
            NullKind::Varchar => Box::new(None::<String>),
            NullKind::Number => Box::new(None::<i64>),
            NullKind::BinaryDouble => Box::new(None::<f64>),
            NullKind::Raw => Box::new(None::<Vec<u8>>),
            NullKind::Date => Box::new(None::<NaiveDate>),
            NullKind::Timestamp => Box::new(None::<NaiveDateTime>),
            NullKind::TimestampTz => Box::new(None::<DateTime<Utc>>),
        }
    }
}

/// Bind kind of every column of a driver batch, from the first non-null
/// value in that column. All-NULL columns bind as text.
pub(crate) fn column_kinds(rows: &[Activation<Value>]) -> Vec<NullKind> {
    let columns = rows.first().map_or(0, |row| row.len());
    (0..columns)
        .map(|column| {
            rows.iter()
                .filter_map(|row| row.get(column).and_then(|v| v.as_ref()))
                .find(|v| !v.is_null())
                .map_or(NullKind::Varchar, NullKind::of)
        })
        .collect()
}

/// Convert one staged value to an Oracle bind value; NULL and unstaged
/// positions bind as a NULL of the column's kind.
pub(crate) fn to_oracle_param(value: Option<&Value>, kind: NullKind) -> Box<dyn ToSql> {
    let Some(value) = value else {
        return kind.null_param();
    };
    match value {
        Value::Null => kind.null_param(),
        // NUMBER(1) flags; SQL BOOLEAN is not available before 23ai
        Value::Bool(b) => Box::new(i64::from(*b)),
        Value::Int32(i) => Box::new(i64::from(*i)),
        Value::Int64(i) => Box::new(*i),
        Value::Float64(f) => Box::new(*f),
        Value::Decimal(d) => Box::new(d.clone()),
        Value::String(s) => Box::new(s.clone()),
        Value::Bytes(b) => Box::new(b.clone()),
        Value::Uuid(u) => Box::new(u.to_string()),
        Value::Date(d) => Box::new(*d),
        Value::DateTime(dt) => Box::new(*dt),
        Value::DateTimeUtc(dt) => Box::new(*dt),
        Value::Json(j) => Box::new(j.to_string()),
    }
}
