//! Oracle data source

use async_trait::async_trait;
use oracle::Connection;
use orabatch_core::{BatchError, BatchStatement, QueryCancelHandle, Result, StatementSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::statement::{OracleBatchStatement, OracleCancelHandle, map_oracle_error};

/// Credentials and connect string of an Oracle database
#[derive(Clone)]
pub struct OracleConnectOptions {
    pub username: String,
    pub password: String,
    /// Easy Connect string or TNS alias, e.g. `//db.example.com:1521/ORCLPDB1`
    pub connect_string: String,
    /// Commit after every driver batch. On by default; with it off the
    /// caller owns the transaction.
    pub autocommit: bool,
}

impl OracleConnectOptions {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        connect_string: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            connect_string: connect_string.into(),
            autocommit: true,
        }
    }
}

impl std::fmt::Debug for OracleConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleConnectOptions")
            .field("username", &self.username)
            .field("password", &"***")
            .field("connect_string", &self.connect_string)
            .field("autocommit", &self.autocommit)
            .finish()
    }
}

/// One Oracle session that batch statements are prepared on.
///
/// The session is shared by every statement of the source; ODPI-C
/// serialises calls on it, and `break_execution` may be called from any
/// thread while a batch is running.
pub struct OracleDataSource {
    conn: Arc<Connection>,
    connect_string: String,
    closed: AtomicBool,
}

impl OracleDataSource {
    pub fn connect(options: &OracleConnectOptions) -> Result<Self> {
        tracing::info!(
            connect_string = %options.connect_string,
            username = %options.username,
            "connecting to Oracle"
        );
        let mut conn =
            Connection::connect(&options.username, &options.password, &options.connect_string)
                .map_err(|e| {
                    BatchError::Connection(format!(
                        "Failed to connect to Oracle at '{}': {}",
                        options.connect_string, e
                    ))
                })?;
        conn.set_autocommit(options.autocommit);

        tracing::info!(connect_string = %options.connect_string, "Oracle session established");
        Ok(Self {
            conn: Arc::new(conn),
            connect_string: options.connect_string.clone(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn connect_string(&self) -> &str {
        &self.connect_string
    }

    /// Handle breaking whatever call is running on the session. Unlike a
    /// statement's own handle it does not stop the batch between calls.
    pub fn cancel_handle(&self) -> Arc<dyn QueryCancelHandle> {
        Arc::new(OracleCancelHandle::new(Arc::clone(&self.conn)))
    }

    /// Close the session. Calls after the first are no-ops.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!(connect_string = %self.connect_string, "closing Oracle session");
        self.conn
            .close()
            .map_err(|e| BatchError::Connection(format!("Failed to close Oracle session: {}", e)))
    }
}

#[async_trait]
impl StatementSource for OracleDataSource {
    fn driver_name(&self) -> &str {
        "oracle"
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn prepare_batch(&self, sql: &str) -> Result<Box<dyn BatchStatement>> {
        if self.is_closed() {
            return Err(BatchError::Connection(format!(
                "Oracle session to '{}' is closed",
                self.connect_string
            )));
        }

        let parameter_count = {
            let stmt = self.conn.statement(sql).build().map_err(map_oracle_error)?;
            if stmt.is_query() {
                return Err(BatchError::NotSupported(
                    "queries cannot be executed as a batch".into(),
                ));
            }
            stmt.bind_count()
        };
        tracing::debug!(parameter_count, "prepared Oracle batch statement");
        Ok(Box::new(OracleBatchStatement::new(
            Arc::clone(&self.conn),
            sql,
            parameter_count,
        )))
    }
}
