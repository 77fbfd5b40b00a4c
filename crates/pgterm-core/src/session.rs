//! Per-connection session state.
//!
//! A [`Session`] is created once a connection is established and is passed by
//! reference through the interpreter, the qualifier and the executor. Access
//! is strictly sequential, so there is no locking.

use thiserror::Error;

/// Schema used until the operator selects another one.
pub const DEFAULT_SCHEMA: &str = "public";

/// Errors raised when a session update would break an invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The active schema can never be empty.
    #[error("schema name cannot be empty")]
    EmptySchema,

    /// The active database can never be reset to an empty name.
    #[error("database name cannot be empty")]
    EmptyDatabase,
}

/// The schema and database a session currently operates against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    active_schema: String,
    active_database: String,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a session on the default schema with no database reported yet.
    pub fn new() -> Self {
        Self {
            active_schema: DEFAULT_SCHEMA.to_string(),
            active_database: String::new(),
        }
    }

    /// Create a session for a database reported by the connection handshake.
    pub fn connected(database: impl Into<String>) -> Self {
        Self {
            active_schema: DEFAULT_SCHEMA.to_string(),
            active_database: database.into(),
        }
    }

    /// Start on a schema other than the default one.
    ///
    /// Blank names are ignored so the session always keeps a schema.
    pub fn with_schema(mut self, schema: &str) -> Self {
        if let Err(e) = self.set_schema(schema) {
            tracing::warn!(error = %e, "Ignoring initial schema");
        }
        self
    }

    /// The active schema.
    pub fn schema(&self) -> &str {
        &self.active_schema
    }

    /// Replace the active schema with the lower-cased `schema`.
    pub fn set_schema(&mut self, schema: &str) -> Result<(), SessionError> {
        let normalized = normalize_schema(schema);
        if normalized.is_empty() {
            return Err(SessionError::EmptySchema);
        }
        tracing::debug!(from = %self.active_schema, to = %normalized, "Active schema changed");
        self.active_schema = normalized;
        Ok(())
    }

    /// The active database, empty until the first connection reports it.
    pub fn database(&self) -> &str {
        &self.active_database
    }

    /// Record the database the server reports as current.
    pub fn set_database(&mut self, database: &str) -> Result<(), SessionError> {
        let database = database.trim();
        if database.is_empty() {
            return Err(SessionError::EmptyDatabase);
        }
        self.active_database = database.to_string();
        Ok(())
    }
}

/// Canonical form of a schema name as stored in the session.
pub fn normalize_schema(schema: &str) -> String {
    schema.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session() {
        let session = Session::new();
        assert_eq!(session.schema(), "public");
        assert_eq!(session.database(), "");
    }

    #[test]
    fn test_set_schema_lowercases() {
        let mut session = Session::connected("shop");
        session.set_schema("Billing").unwrap();
        assert_eq!(session.schema(), "billing");
        assert_eq!(session.database(), "shop");
    }

    #[test]
    fn test_empty_schema_rejected() {
        let mut session = Session::new();
        assert_eq!(session.set_schema("   "), Err(SessionError::EmptySchema));
        assert_eq!(session.schema(), "public");
    }

    #[test]
    fn test_with_schema_ignores_blank() {
        let session = Session::new().with_schema("");
        assert_eq!(session.schema(), "public");

        let session = Session::new().with_schema("Sales");
        assert_eq!(session.schema(), "sales");
    }

    #[test]
    fn test_set_database() {
        let mut session = Session::new();
        session.set_database("analytics").unwrap();
        assert_eq!(session.database(), "analytics");
        assert_eq!(session.set_database(""), Err(SessionError::EmptyDatabase));
        assert_eq!(session.database(), "analytics");
    }
}
