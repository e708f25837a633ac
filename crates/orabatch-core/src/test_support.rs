//! Test doubles for the driver surface and binders

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::{
    BatchBinder, BatchError, BatchStatement, InterruptibleBinder, ParameterDisposer,
    ParameterizedBinder, QueryCancelHandle, Result, StatementSource, Value,
};

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("orabatch_core=trace")
        .with_test_writer()
        .try_init();
}

/// One driver interaction observed by [`RecordingStatement`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Threshold(usize),
    Execute,
    Flush,
    Close,
}

pub(crate) struct RecordingCancel(Arc<AtomicBool>);

impl QueryCancelHandle for RecordingCancel {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// In-memory statement with Oracle-style update batching.
///
/// Every activation affects exactly one row, so a send reports the number of
/// activations it carried.
pub(crate) struct RecordingStatement {
    sql: String,
    threshold: usize,
    staged: Vec<(usize, Value)>,
    queue: Vec<Vec<(usize, Value)>>,
    sent: Vec<Vec<(usize, Value)>>,
    events: Vec<Event>,
    executes: usize,
    fail_on_execute: Option<usize>,
    stall_on_execute: Option<usize>,
    fail_flush: bool,
    cancelled: Arc<AtomicBool>,
    close_counter: Option<Arc<AtomicUsize>>,
}

impl RecordingStatement {
    pub(crate) fn new(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            threshold: 1,
            staged: Vec::new(),
            queue: Vec::new(),
            sent: Vec::new(),
            events: Vec::new(),
            executes: 0,
            fail_on_execute: None,
            stall_on_execute: None,
            fail_flush: false,
            cancelled: Arc::new(AtomicBool::new(false)),
            close_counter: None,
        }
    }

    /// Fail the `nth` (0-based) call to `execute_one`
    pub(crate) fn fail_on_execute(mut self, nth: usize) -> Self {
        self.fail_on_execute = Some(nth);
        self
    }

    /// Never complete the `nth` (0-based) call to `execute_one`
    pub(crate) fn stall_on_execute(mut self, nth: usize) -> Self {
        self.stall_on_execute = Some(nth);
        self
    }

    pub(crate) fn count_closes(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.close_counter = Some(counter);
        self
    }

    pub(crate) fn fail_flush(mut self) -> Self {
        self.fail_flush = true;
        self
    }

    pub(crate) fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn thresholds(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Threshold(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn flushes(&self) -> usize {
        self.events.iter().filter(|e| **e == Event::Flush).count()
    }

    pub(crate) fn staged(&self) -> &[(usize, Value)] {
        &self.staged
    }

    /// First parameter of every activation sent so far, in send order
    pub(crate) fn sent_keys(&self) -> Vec<Value> {
        self.sent
            .iter()
            .filter_map(|row| row.first().map(|(_, v)| v.clone()))
            .collect()
    }

    fn send_queue(&mut self) -> u64 {
        let rows = self.queue.len() as u64;
        self.sent.append(&mut self.queue);
        rows
    }
}

#[async_trait]
impl BatchStatement for RecordingStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    async fn set_batch_threshold(&mut self, threshold: usize) -> Result<()> {
        self.send_queue();
        self.threshold = threshold;
        self.events.push(Event::Threshold(threshold));
        Ok(())
    }

    fn batch_threshold(&self) -> usize {
        self.threshold
    }

    fn set_param(&mut self, position: usize, value: Value) -> Result<()> {
        self.staged.push((position, value));
        Ok(())
    }

    async fn execute_one(&mut self) -> Result<u64> {
        let call = self.executes;
        self.executes += 1;
        self.events.push(Event::Execute);
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(BatchError::Cancelled);
        }
        if self.fail_on_execute == Some(call) {
            return Err(BatchError::Query(format!("injected failure on execute {}", call)));
        }
        if self.stall_on_execute == Some(call) {
            std::future::pending::<()>().await;
        }
        let activation = std::mem::take(&mut self.staged);
        self.queue.push(activation);
        if self.queue.len() >= self.threshold {
            Ok(self.send_queue())
        } else {
            Ok(0)
        }
    }

    async fn flush_remaining(&mut self) -> Result<u64> {
        self.events.push(Event::Flush);
        if self.fail_flush {
            return Err(BatchError::Query("injected flush failure".into()));
        }
        Ok(self.send_queue())
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(RecordingCancel(self.cancelled.clone())))
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        self.events.push(Event::Close);
        if let Some(counter) = &self.close_counter {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Data source handing out [`RecordingStatement`]s
pub(crate) struct RecordingSource {
    closed: AtomicBool,
    prepares: AtomicUsize,
    closes: Arc<AtomicUsize>,
    fail_on_execute: Option<usize>,
}

impl RecordingSource {
    pub(crate) fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            prepares: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            fail_on_execute: None,
        }
    }

    /// Every prepared statement fails its `nth` execute
    pub(crate) fn failing_on_execute(nth: usize) -> Self {
        Self {
            fail_on_execute: Some(nth),
            ..Self::new()
        }
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn prepares(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatementSource for RecordingSource {
    fn driver_name(&self) -> &str {
        "recording"
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn prepare_batch(&self, sql: &str) -> Result<Box<dyn BatchStatement>> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        let mut statement = RecordingStatement::new(sql).count_closes(self.closes.clone());
        if let Some(nth) = self.fail_on_execute {
            statement = statement.fail_on_execute(nth);
        }
        Ok(Box::new(statement))
    }
}

/// Binder wrapper counting disposals, optionally failing them.
pub(crate) struct Tracked<B> {
    pub(crate) inner: B,
    pub(crate) disposals: usize,
    fail_cleanup: bool,
}

impl<B> Tracked<B> {
    pub(crate) fn new(inner: B) -> Self {
        Self {
            inner,
            disposals: 0,
            fail_cleanup: false,
        }
    }

    pub(crate) fn failing_cleanup(inner: B) -> Self {
        Self {
            inner,
            disposals: 0,
            fail_cleanup: true,
        }
    }
}

impl<B: Send> ParameterDisposer for Tracked<B> {
    fn cleanup_parameters(&mut self) -> Result<()> {
        self.disposals += 1;
        if self.fail_cleanup {
            return Err(BatchError::Cleanup("could not free staged parameters".into()));
        }
        Ok(())
    }
}

impl<B: BatchBinder> BatchBinder for Tracked<B> {
    fn row_count(&self) -> usize {
        self.inner.row_count()
    }

    fn bind(&mut self, statement: &mut dyn BatchStatement, row_index: usize) -> Result<()> {
        self.inner.bind(statement, row_index)
    }

    fn as_interruptible(&mut self) -> Option<&mut dyn InterruptibleBinder> {
        self.inner.as_interruptible()
    }

    fn as_disposer(&mut self) -> Option<&mut dyn ParameterDisposer> {
        Some(self)
    }
}

/// Argument-binder counterpart of [`Tracked`]
pub(crate) struct TrackedArgs<B> {
    pub(crate) inner: B,
    pub(crate) disposals: usize,
}

impl<B> TrackedArgs<B> {
    pub(crate) fn new(inner: B) -> Self {
        Self { inner, disposals: 0 }
    }
}

impl<B: Send> ParameterDisposer for TrackedArgs<B> {
    fn cleanup_parameters(&mut self) -> Result<()> {
        self.disposals += 1;
        Ok(())
    }
}

impl<T, B: ParameterizedBinder<T>> ParameterizedBinder<T> for TrackedArgs<B> {
    fn bind(&mut self, statement: &mut dyn BatchStatement, argument: &T) -> Result<()> {
        self.inner.bind(statement, argument)
    }

    fn as_disposer(&mut self) -> Option<&mut dyn ParameterDisposer> {
        Some(self)
    }
}

/// Rows `[1], [2], ..., [n]` as single-column activations
pub(crate) fn numbered_rows(n: usize) -> Vec<Vec<Value>> {
    (1..=n as i64).map(|i| vec![Value::Int64(i)]).collect()
}
