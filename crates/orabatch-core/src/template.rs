//! Batch update facade
//!
//! [`BatchTemplate`] validates the send-batch size once, picks the executor
//! matching the binder's capabilities and guarantees that a binder holding
//! staged parameters is disposed exactly once per call.

use std::borrow::Cow;
use std::sync::Arc;

use crate::batch::{FixedBatchExecutor, InterruptibleBatchExecutor, KeyedBatchExecutor};
use crate::binder::CleanupGuard;
use crate::{
    BatchBinder, BatchConfig, BatchError, BatchStatement, ParameterizedBinder, Result, RowCounts,
    SendBatchSize, StatementSource,
};

const DEFAULT_SQL_PREVIEW_CHARS: usize = 100;

/// Entry point for batched DML.
#[derive(Clone)]
pub struct BatchTemplate {
    send_batch_size: SendBatchSize,
    data_source: Option<Arc<dyn StatementSource>>,
    sql_preview_chars: usize,
}

impl std::fmt::Debug for BatchTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchTemplate")
            .field("send_batch_size", &self.send_batch_size)
            .field(
                "data_source",
                &self.data_source.as_ref().map(|s| s.driver_name().to_string()),
            )
            .finish()
    }
}

impl BatchTemplate {
    /// Template without a data source, for use with caller-owned statements.
    ///
    /// Fails with [`BatchError::Configuration`] when `send_batch_size` is not
    /// positive.
    pub fn new(send_batch_size: i64) -> Result<Self> {
        Ok(Self {
            send_batch_size: SendBatchSize::new(send_batch_size)?,
            data_source: None,
            sql_preview_chars: DEFAULT_SQL_PREVIEW_CHARS,
        })
    }

    /// Template preparing its statements on `source`.
    ///
    /// With `lazy_init` off the source is checked immediately and a closed
    /// source fails with [`BatchError::Connection`]. No statement is prepared
    /// either way.
    pub fn with_data_source(
        send_batch_size: i64,
        source: Arc<dyn StatementSource>,
        lazy_init: bool,
    ) -> Result<Self> {
        let mut template = Self::new(send_batch_size)?;
        if !lazy_init {
            ensure_open(source.as_ref())?;
        }
        tracing::info!(
            driver = source.driver_name(),
            send_batch_size = template.send_batch_size.get(),
            lazy_init,
            "batch template initialised"
        );
        template.data_source = Some(source);
        Ok(template)
    }

    pub fn from_config(
        config: &BatchConfig,
        source: Option<Arc<dyn StatementSource>>,
    ) -> Result<Self> {
        let template = match source {
            Some(source) => {
                Self::with_data_source(config.send_batch_size, source, config.lazy_init)?
            }
            None => Self::new(config.send_batch_size)?,
        };
        Ok(template.with_sql_preview_chars(config.sql_preview_chars))
    }

    pub fn with_sql_preview_chars(mut self, chars: usize) -> Self {
        self.sql_preview_chars = chars;
        self
    }

    pub fn send_batch_size(&self) -> SendBatchSize {
        self.send_batch_size
    }

    pub fn data_source(&self) -> Option<&Arc<dyn StatementSource>> {
        self.data_source.as_ref()
    }

    /// Prepare `sql` on the data source and execute every row of `binder`.
    ///
    /// Interruptible binders run until exhausted; all others run in fixed
    /// chunks of the send-batch size. Returns one count per row bound.
    pub async fn batch_update(
        &self,
        sql: &str,
        binder: &mut dyn BatchBinder,
    ) -> Result<RowCounts> {
        let mut binder = CleanupGuard::new(binder);
        tracing::debug!(sql = %self.sql_preview(sql), "executing SQL batch update");

        let outcome = match self.prepare(sql).await {
            Ok(mut statement) => {
                let outcome = self.dispatch(statement.as_mut(), &mut *binder).await;
                close_statement(statement).await;
                outcome
            }
            Err(e) => Err(e),
        };
        binder.finish(outcome)
    }

    /// Prepare `sql` on the data source and execute one row per argument in
    /// chunks of `batch_size`, returning one count array per chunk.
    pub async fn batch_update_with_args<T: Sync>(
        &self,
        sql: &str,
        arguments: &[T],
        batch_size: usize,
        binder: &mut dyn ParameterizedBinder<T>,
    ) -> Result<Vec<RowCounts>> {
        let mut binder = CleanupGuard::new(binder);
        tracing::debug!(
            sql = %self.sql_preview(sql),
            batch_size,
            "executing SQL batch update"
        );

        let executor = match KeyedBatchExecutor::new(batch_size) {
            Ok(executor) => executor,
            Err(e) => return binder.finish(Err(e)),
        };
        let outcome = match self.prepare(sql).await {
            Ok(mut statement) => {
                let outcome = executor
                    .execute(statement.as_mut(), arguments, &mut *binder)
                    .await;
                close_statement(statement).await;
                outcome
            }
            Err(e) => Err(e),
        };
        binder.finish(outcome)
    }

    /// Run [`batch_update`](Self::batch_update) on a statement the caller
    /// prepared and keeps ownership of.
    pub async fn execute_batch(
        &self,
        statement: &mut dyn BatchStatement,
        binder: &mut dyn BatchBinder,
    ) -> Result<RowCounts> {
        let mut binder = CleanupGuard::new(binder);
        tracing::debug!(sql = %self.sql_preview(statement.sql()), "executing SQL batch update");
        let outcome = self.dispatch(statement, &mut *binder).await;
        binder.finish(outcome)
    }

    pub async fn execute_batch_with_args<T: Sync>(
        &self,
        statement: &mut dyn BatchStatement,
        arguments: &[T],
        batch_size: usize,
        binder: &mut dyn ParameterizedBinder<T>,
    ) -> Result<Vec<RowCounts>> {
        let mut binder = CleanupGuard::new(binder);
        tracing::debug!(
            sql = %self.sql_preview(statement.sql()),
            batch_size,
            "executing SQL batch update"
        );
        let outcome = match KeyedBatchExecutor::new(batch_size) {
            Ok(executor) => executor.execute(statement, arguments, &mut *binder).await,
            Err(e) => Err(e),
        };
        binder.finish(outcome)
    }

    async fn dispatch(
        &self,
        statement: &mut dyn BatchStatement,
        binder: &mut dyn BatchBinder,
    ) -> Result<RowCounts> {
        match binder.as_interruptible() {
            Some(interruptible) => {
                InterruptibleBatchExecutor::new(self.send_batch_size)
                    .execute(statement, interruptible)
                    .await
            }
            None => {
                FixedBatchExecutor::new(self.send_batch_size)
                    .execute(statement, binder)
                    .await
            }
        }
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn BatchStatement>> {
        let source = self.data_source.as_ref().ok_or_else(|| {
            BatchError::Configuration(
                "No data source configured; use execute_batch with a prepared statement".into(),
            )
        })?;
        ensure_open(source.as_ref())?;
        source.prepare_batch(sql).await
    }

    fn sql_preview<'s>(&self, sql: &'s str) -> Cow<'s, str> {
        match sql.char_indices().nth(self.sql_preview_chars) {
            Some((end, _)) => Cow::Owned(format!("{}...", &sql[..end])),
            None => Cow::Borrowed(sql),
        }
    }
}

fn ensure_open(source: &dyn StatementSource) -> Result<()> {
    if source.is_closed() {
        return Err(BatchError::Connection(format!(
            "{} data source is closed",
            source.driver_name()
        )));
    }
    Ok(())
}

async fn close_statement(statement: Box<dyn BatchStatement>) {
    if let Err(e) = statement.close().await {
        tracing::warn!(error = %e, "failed to close batch statement");
    }
}
