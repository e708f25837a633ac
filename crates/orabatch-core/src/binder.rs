//! Row binders: the caller side of a batch
//!
//! A binder stages the values of one logical row onto a [`BatchStatement`].
//! Capabilities beyond plain binding are advertised through probe methods
//! (`as_interruptible`, `as_disposer`) that default to `None`, so a binder
//! only implements what it actually supports.

use std::iter::Peekable;
use std::ops::{Deref, DerefMut};

use crate::{BatchError, BatchStatement, Result, Value};

/// Releases resources a binder staged for the statement (parameter buffers,
/// driver-side collections, temporary files).
pub trait ParameterDisposer: Send {
    /// Release staged resources. May be called more than once; calls after
    /// the first must be no-ops.
    fn cleanup_parameters(&mut self) -> Result<()>;
}

/// Binds the rows of a batch whose size is known up front.
pub trait BatchBinder: Send {
    /// Number of rows in the batch. For early-terminating binders this is
    /// only a nominal ceiling used as a loop bound.
    fn row_count(&self) -> usize;

    /// Stage the values of row `row_index` on `statement`.
    fn bind(&mut self, statement: &mut dyn BatchStatement, row_index: usize) -> Result<()>;

    /// Get the early-terminating view of this binder if supported
    fn as_interruptible(&mut self) -> Option<&mut dyn InterruptibleBinder> {
        None
    }

    /// Get the disposal view of this binder if it holds disposable state
    fn as_disposer(&mut self) -> Option<&mut dyn ParameterDisposer> {
        None
    }
}

/// A binder over a row source of unknown length.
pub trait InterruptibleBinder: BatchBinder {
    /// Whether the row source has no row `row_index`. Queried before binding.
    fn is_exhausted(&mut self, row_index: usize) -> bool;
}

/// Binds one typed argument object per row.
pub trait ParameterizedBinder<T>: Send {
    fn bind(&mut self, statement: &mut dyn BatchStatement, argument: &T) -> Result<()>;

    /// Get the disposal view of this binder if it holds disposable state
    fn as_disposer(&mut self) -> Option<&mut dyn ParameterDisposer> {
        None
    }
}

/// Stage `values` at positions `1..=values.len()`.
pub fn bind_values<I>(statement: &mut dyn BatchStatement, values: I) -> Result<()>
where
    I: IntoIterator<Item = Value>,
{
    for (idx, value) in values.into_iter().enumerate() {
        statement.set_param(idx + 1, value)?;
    }
    Ok(())
}

/// Fixed-count binder over rows held in memory.
///
/// Disposal drops the staged rows; the binder reports zero rows afterwards.
#[derive(Debug, Clone, Default)]
pub struct RowsBinder {
    rows: Vec<Vec<Value>>,
    disposed: bool,
}

impl RowsBinder {
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        Self {
            rows,
            disposed: false,
        }
    }

    /// Whether `cleanup_parameters` has run
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl BatchBinder for RowsBinder {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn bind(&mut self, statement: &mut dyn BatchStatement, row_index: usize) -> Result<()> {
        let row = self.rows.get(row_index).ok_or_else(|| BatchError::Bind {
            row: row_index,
            message: format!("no such row, batch has {} rows", self.rows.len()),
        })?;
        bind_values(statement, row.iter().cloned())
    }

    fn as_disposer(&mut self) -> Option<&mut dyn ParameterDisposer> {
        Some(self)
    }
}

impl ParameterDisposer for RowsBinder {
    fn cleanup_parameters(&mut self) -> Result<()> {
        self.rows = Vec::new();
        self.disposed = true;
        Ok(())
    }
}

/// Early-terminating binder over any iterator of rows.
pub struct IterBinder<I: Iterator<Item = Vec<Value>>> {
    rows: Peekable<I>,
    ceiling: usize,
}

impl<I> IterBinder<I>
where
    I: Iterator<Item = Vec<Value>> + Send,
{
    /// Binder with no nominal ceiling; runs until the iterator ends.
    pub fn new(rows: impl IntoIterator<IntoIter = I>) -> Self {
        Self::with_ceiling(rows, usize::MAX)
    }

    /// Binder that stops after `ceiling` rows even if the iterator has more.
    pub fn with_ceiling(rows: impl IntoIterator<IntoIter = I>, ceiling: usize) -> Self {
        Self {
            rows: rows.into_iter().peekable(),
            ceiling,
        }
    }
}

impl<I> BatchBinder for IterBinder<I>
where
    I: Iterator<Item = Vec<Value>> + Send,
{
    fn row_count(&self) -> usize {
        self.ceiling
    }

    fn bind(&mut self, statement: &mut dyn BatchStatement, row_index: usize) -> Result<()> {
        let row = self.rows.next().ok_or_else(|| BatchError::Bind {
            row: row_index,
            message: "row source is exhausted".into(),
        })?;
        bind_values(statement, row)
    }

    fn as_interruptible(&mut self) -> Option<&mut dyn InterruptibleBinder> {
        Some(self)
    }
}

impl<I> InterruptibleBinder for IterBinder<I>
where
    I: Iterator<Item = Vec<Value>> + Send,
{
    fn is_exhausted(&mut self, _row_index: usize) -> bool {
        self.rows.peek().is_none()
    }
}

/// Fixed-count binder from a closure.
pub struct FnBinder<F> {
    row_count: usize,
    bind: F,
}

impl<F> FnBinder<F>
where
    F: FnMut(&mut dyn BatchStatement, usize) -> Result<()> + Send,
{
    pub fn new(row_count: usize, bind: F) -> Self {
        Self { row_count, bind }
    }
}

impl<F> BatchBinder for FnBinder<F>
where
    F: FnMut(&mut dyn BatchStatement, usize) -> Result<()> + Send,
{
    fn row_count(&self) -> usize {
        self.row_count
    }

    fn bind(&mut self, statement: &mut dyn BatchStatement, row_index: usize) -> Result<()> {
        (self.bind)(statement, row_index)
    }
}

/// Argument binder from a closure.
pub struct FnArgBinder<F> {
    bind: F,
}

impl<F> FnArgBinder<F> {
    pub fn new<T>(bind: F) -> Self
    where
        F: FnMut(&mut dyn BatchStatement, &T) -> Result<()> + Send,
    {
        Self { bind }
    }
}

impl<T, F> ParameterizedBinder<T> for FnArgBinder<F>
where
    F: FnMut(&mut dyn BatchStatement, &T) -> Result<()> + Send,
{
    fn bind(&mut self, statement: &mut dyn BatchStatement, argument: &T) -> Result<()> {
        (self.bind)(statement, argument)
    }
}

/// Binds each argument's values positionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValuesBinder;

impl ParameterizedBinder<Vec<Value>> for ValuesBinder {
    fn bind(&mut self, statement: &mut dyn BatchStatement, argument: &Vec<Value>) -> Result<()> {
        bind_values(statement, argument.iter().cloned())
    }
}

/// Uniform access to the disposal capability of both binder shapes.
pub(crate) trait HoldsParameters {
    fn disposer(&mut self) -> Option<&mut dyn ParameterDisposer>;
}

impl HoldsParameters for dyn BatchBinder + '_ {
    fn disposer(&mut self) -> Option<&mut dyn ParameterDisposer> {
        self.as_disposer()
    }
}

impl<T> HoldsParameters for dyn ParameterizedBinder<T> + '_ {
    fn disposer(&mut self) -> Option<&mut dyn ParameterDisposer> {
        self.as_disposer()
    }
}

/// Runs a binder's disposal exactly once when a batch call exits.
///
/// The normal exit path goes through [`CleanupGuard::finish`], which merges
/// the cleanup outcome into the call's result. If the call is abandoned
/// instead (future dropped, panic unwinding) the guard disposes on drop and
/// logs a cleanup failure, since there is no caller left to report it to.
pub(crate) struct CleanupGuard<'a, B: ?Sized + HoldsParameters> {
    binder: &'a mut B,
    armed: bool,
}

impl<'a, B: ?Sized + HoldsParameters> CleanupGuard<'a, B> {
    pub(crate) fn new(binder: &'a mut B) -> Self {
        Self {
            binder,
            armed: true,
        }
    }

    pub(crate) fn finish<R>(mut self, outcome: Result<R>) -> Result<R> {
        let cleanup = self.dispose();
        BatchError::merge_cleanup(outcome, cleanup)
    }

    fn dispose(&mut self) -> Result<()> {
        if !self.armed {
            return Ok(());
        }
        self.armed = false;
        match self.binder.disposer() {
            Some(disposer) => disposer.cleanup_parameters(),
            None => Ok(()),
        }
    }
}

impl<B: ?Sized + HoldsParameters> Deref for CleanupGuard<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        &*self.binder
    }
}

impl<B: ?Sized + HoldsParameters> DerefMut for CleanupGuard<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        &mut *self.binder
    }
}

impl<B: ?Sized + HoldsParameters> Drop for CleanupGuard<'_, B> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("batch call abandoned before completion, disposing binder parameters");
            if let Err(e) = self.dispose() {
                tracing::error!(error = %e, "parameter cleanup on drop failed");
            }
        }
    }
}
