//! SQLite data source

use async_trait::async_trait;
use orabatch_core::{BatchError, BatchStatement, QueryCancelHandle, Result, StatementSource};
use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, InterruptHandle, OpenFlags};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::statement::{SqliteBatchStatement, SqliteCancelHandle};

/// A SQLite database that batch statements are prepared on.
///
/// All statements share the one connection, so batches prepared from the
/// same source run strictly one after another.
pub struct SqliteDataSource {
    conn: Arc<Mutex<RusqliteConnection>>,
    interrupt_handle: Arc<InterruptHandle>,
    path: String,
    closed: AtomicBool,
}

impl std::fmt::Debug for SqliteDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDataSource")
            .field("path", &self.path)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl SqliteDataSource {
    /// Open a SQLite database
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");
        let expanded_path = Self::expand_path(path)?;

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                BatchError::Connection(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            if !expanded_path.starts_with("file:") {
                let file_path = std::path::Path::new(&expanded_path);
                if let Some(parent) = file_path.parent()
                    && !parent.exists()
                {
                    return Err(BatchError::Connection(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }

            let conn = RusqliteConnection::open_with_flags(&expanded_path, flags).map_err(|e| {
                BatchError::Connection(format!(
                    "Failed to open SQLite database at '{}': {}",
                    expanded_path, e
                ))
            })?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| BatchError::Connection(format!("Failed to set journal mode: {}", e)))?;
            conn.pragma_update(None, "synchronous", "NORMAL").map_err(|e| {
                BatchError::Connection(format!("Failed to set synchronous mode: {}", e))
            })?;
            conn
        };

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| BatchError::Connection(format!("Failed to enable foreign keys: {}", e)))?;

        // Taken before the connection goes behind the mutex, usable from any thread
        let interrupt_handle = Arc::new(conn.get_interrupt_handle());

        tracing::info!(path = %expanded_path, "SQLite database connection established");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt_handle,
            path: expanded_path,
            closed: AtomicBool::new(false),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// Resolved database path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Expand `~/` and make relative paths absolute
    pub(crate) fn expand_path(path: &str) -> Result<String> {
        if path == ":memory:" || path.starts_with("file:") {
            return Ok(path.to_string());
        }

        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            let home = dirs::home_dir().ok_or_else(|| {
                BatchError::Configuration("Unable to determine home directory".into())
            })?;
            home.join(rest).to_string_lossy().to_string()
        } else if path.starts_with('~') {
            return Err(BatchError::Configuration(
                "User-specific home directories (~user) are not supported".into(),
            ));
        } else {
            path.to_string()
        };

        let path_buf = std::path::PathBuf::from(&expanded);
        if path_buf.is_relative() {
            Ok(std::env::current_dir()?
                .join(path_buf)
                .to_string_lossy()
                .to_string())
        } else {
            Ok(expanded)
        }
    }

    /// Run one or more statements outside of any batch (schema setup, cleanup)
    pub fn execute_script(&self, sql: &str) -> Result<()> {
        self.ensure_open()?;
        tracing::debug!("executing SQL script");
        let conn = self.conn.lock();
        conn.execute_batch(sql)
            .map_err(|e| BatchError::Query(format!("Failed to execute script: {}", e)))
    }

    /// First column of the first row of `sql` as an integer
    pub fn query_i64(&self, sql: &str) -> Result<i64> {
        self.ensure_open()?;
        let conn = self.conn.lock();
        conn.query_row(sql, [], |row| row.get(0))
            .map_err(|e| BatchError::Query(format!("Failed to execute query: {}", e)))
    }

    /// Handle interrupting whatever statement of this source is running
    pub fn cancel_handle(&self) -> Arc<dyn QueryCancelHandle> {
        Arc::new(SqliteCancelHandle::new(self.interrupt_handle.clone()))
    }

    /// Stop handing out statements. Statements already prepared keep working
    /// until they are closed.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!(path = %self.path, "closing SQLite data source");
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(BatchError::Connection(format!(
                "SQLite data source '{}' is closed",
                self.path
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StatementSource for SqliteDataSource {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn prepare_batch(&self, sql: &str) -> Result<Box<dyn BatchStatement>> {
        self.ensure_open()?;
        let parameter_count = {
            let conn = self.conn.lock();
            let stmt = conn
                .prepare_cached(sql)
                .map_err(|e| BatchError::Query(format!("Failed to prepare statement: {}", e)))?;
            stmt.parameter_count()
        };
        tracing::debug!(parameter_count, "prepared SQLite batch statement");
        Ok(Box::new(SqliteBatchStatement::new(
            Arc::clone(&self.conn),
            Arc::clone(&self.interrupt_handle),
            sql,
            parameter_count,
        )))
    }
}
