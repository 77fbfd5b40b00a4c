//! Error types for the SQL crate.

use pgterm_core::SessionError;
use thiserror::Error;

/// Reason attached to a declined confirmation.
pub const QUERY_CANCELLED: &str = "Safe choice. Query cancelled";

/// Errors that end the processing of one input line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SqlError {
    /// A recognized command is missing a required argument.
    #[error("missing argument for {verb}")]
    MissingArgument { verb: String },

    /// Empty input, or an unknown `SHOW`/`USE` sub-command.
    #[error("unsupported command: {command}")]
    UnsupportedCommand { command: String },

    /// The statement could not be parsed.
    #[error("invalid SQL: {0}")]
    InvalidSql(String),

    /// The qualified statement could not be turned back into valid SQL.
    #[error("failed to rewrite SQL: {0}")]
    RewriteFailure(String),

    /// An unfiltered mutation was not confirmed.
    #[error("{reason}")]
    SafetyAbort { reason: String },

    /// A session update was rejected.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl SqlError {
    pub(crate) fn missing(verb: &str) -> Self {
        SqlError::MissingArgument {
            verb: verb.to_string(),
        }
    }

    pub(crate) fn unsupported(command: &str) -> Self {
        SqlError::UnsupportedCommand {
            command: command.to_string(),
        }
    }
}
