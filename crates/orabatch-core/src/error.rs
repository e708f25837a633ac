//! Error types for batch execution

use thiserror::Error;

/// Core error type for batch operations
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Bind error at row {row}: {message}")]
    Bind { row: usize, message: String },

    #[error("Cancelled")]
    Cancelled,

    #[error("Cleanup error: {0}")]
    Cleanup(String),

    /// Execution failed and the disposal that followed failed too.
    #[error("{source} (cleanup also failed: {cleanup})")]
    CleanupAfterFailure {
        #[source]
        source: Box<BatchError>,
        cleanup: Box<BatchError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl BatchError {
    /// Shorthand for the error raised when the send-batch size or a chunk size
    /// is not a positive integer.
    pub fn invalid_batch_size(size: impl std::fmt::Display) -> Self {
        BatchError::Configuration(format!(
            "Invalid batch size: {}. Must be greater than 0.",
            size
        ))
    }

    /// Whether this error came out of binding, executing or flushing rows.
    pub fn is_execution_failure(&self) -> bool {
        match self {
            BatchError::Query(_) | BatchError::Bind { .. } | BatchError::Cancelled => true,
            BatchError::CleanupAfterFailure { source, .. } => source.is_execution_failure(),
            _ => false,
        }
    }

    /// The error that should be reported to the caller first.
    pub fn primary(&self) -> &BatchError {
        match self {
            BatchError::CleanupAfterFailure { source, .. } => source.primary(),
            other => other,
        }
    }

    /// The disposal failure carried by this error, if any.
    pub fn cleanup_failure(&self) -> Option<&BatchError> {
        match self {
            BatchError::Cleanup(_) => Some(self),
            BatchError::CleanupAfterFailure { cleanup, .. } => Some(cleanup),
            _ => None,
        }
    }

    /// Combine the outcome of an operation with the outcome of the cleanup
    /// that ran after it. An execution failure always stays primary.
    pub(crate) fn merge_cleanup<T>(outcome: Result<T>, cleanup: Result<()>) -> Result<T> {
        match (outcome, cleanup) {
            (outcome, Ok(())) => outcome,
            (Ok(_), Err(cleanup)) => Err(cleanup.into_cleanup()),
            (Err(source), Err(cleanup)) => Err(BatchError::CleanupAfterFailure {
                source: Box::new(source),
                cleanup: Box::new(cleanup.into_cleanup()),
            }),
        }
    }

    fn into_cleanup(self) -> BatchError {
        match self {
            BatchError::Cleanup(_) => self,
            other => BatchError::Cleanup(other.to_string()),
        }
    }
}

/// Result type alias for batch operations
pub type Result<T> = std::result::Result<T, BatchError>;
