//! Error types for the runtime crate.

use pgterm_core::SessionError;
use pgterm_sql::SqlError;
use thiserror::Error;

/// Errors that end the processing of one input line.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Interpretation, qualification or the safety guard rejected the line.
    #[error(transparent)]
    Sql(#[from] SqlError),

    /// The server rejected the statement or the connection failed.
    #[error("{0:#}")]
    Execution(anyhow::Error),

    /// Connecting to another database failed; the old connection is kept.
    #[error("cannot switch to database {database}: {error:#}")]
    Reconnect {
        database: String,
        error: anyhow::Error,
    },

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl RuntimeError {
    /// Whether the line was stopped at the confirmation prompt.
    pub fn is_safety_abort(&self) -> bool {
        matches!(self, RuntimeError::Sql(SqlError::SafetyAbort { .. }))
    }
}
