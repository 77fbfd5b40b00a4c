//! Turns one input line into SQL or a session change.

use pgterm_core::{Session, SessionError};

use crate::command::{Command, ShowTarget, UseTarget};
use crate::error::SqlError;

/// What to do with one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
    /// SQL to send, or a message for the operator when not executable.
    pub text: String,
    /// Whether `text` goes to the database.
    pub executable: bool,
    /// Whether `text` must pass through the schema qualifier first.
    pub needs_qualification: bool,
    /// Whether the prompt shows stale schema or database names.
    pub prompt_reset_required: bool,
    /// Database to reconnect to. The session is updated by whoever performs
    /// the reconnection, once it has succeeded.
    pub reconnect: Option<String>,
}

impl Interpretation {
    fn query(sql: String) -> Self {
        Self {
            text: sql,
            executable: true,
            needs_qualification: false,
            prompt_reset_required: false,
            reconnect: None,
        }
    }

    fn pass_through(sql: String, qualify: bool) -> Self {
        Self {
            needs_qualification: qualify,
            ..Self::query(sql)
        }
    }

    fn message(text: String) -> Self {
        Self {
            text,
            executable: false,
            needs_qualification: false,
            prompt_reset_required: true,
            reconnect: None,
        }
    }
}

/// Classifies input lines against the current session.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }

    /// Interpret one complete input line.
    ///
    /// Only a validated `USE SCHEMA` changes `session`; every error leaves it
    /// as it was.
    pub fn interpret(&self, input: &str, session: &mut Session) -> Result<Interpretation, SqlError> {
        let command = Command::parse(input)?;
        tracing::debug!(?command, "Classified input");

        let interpretation = match command {
            Command::Show(target) => Interpretation::query(show_sql(&target, session.schema())),
            Command::Describe(table) => {
                Interpretation::query(describe_sql(&table, session.schema()))
            }
            Command::Use(UseTarget::Schema(schema)) => {
                session.set_schema(&unquote(&schema))?;
                Interpretation::message(format!("Schema changed to {}", session.schema()))
            }
            Command::Use(UseTarget::Database(database)) => {
                let database = unquote(&database);
                if database.trim().is_empty() {
                    return Err(SessionError::EmptyDatabase.into());
                }
                Interpretation {
                    reconnect: Some(database.clone()),
                    ..Interpretation::message(format!("Database changed to {database}"))
                }
            }
            Command::PassThrough { sql, qualify } => Interpretation::pass_through(sql, qualify),
        };
        Ok(interpretation)
    }
}

fn show_sql(target: &ShowTarget, schema: &str) -> String {
    match target {
        ShowTarget::Schemas => "SELECT schema_name FROM information_schema.schemata;".to_string(),
        ShowTarget::Tables => format!(
            "SELECT tablename FROM pg_tables WHERE schemaname = {};",
            literal(schema)
        ),
        ShowTarget::Databases => {
            "SELECT datname FROM pg_database WHERE datistemplate = false;".to_string()
        }
        ShowTarget::CreateTable(table) => {
            let (schema, table) = split_table(table, schema);
            format!(
                "SELECT 'CREATE TABLE ' || table_schema || '.' || table_name || E' (\\n' || \
                 string_agg('  ' || column_name || ' ' || data_type || \
                 CASE WHEN character_maximum_length IS NOT NULL \
                 THEN '(' || character_maximum_length || ')' ELSE '' END || \
                 CASE WHEN is_nullable = 'NO' THEN ' NOT NULL' ELSE '' END, \
                 E',\\n' ORDER BY ordinal_position) || E'\\n);' AS create_table \
                 FROM information_schema.columns \
                 WHERE table_schema = {} AND table_name = {} \
                 GROUP BY table_schema, table_name;",
                literal(&schema),
                literal(&table)
            )
        }
    }
}

fn describe_sql(table: &str, schema: &str) -> String {
    let (schema, table) = split_table(table, schema);
    format!(
        "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
         WHERE table_schema = {} AND table_name = {} ORDER BY ordinal_position;",
        literal(&schema),
        literal(&table)
    )
}

/// `schema.table` names their own schema; bare names use the active one.
fn split_table(name: &str, active_schema: &str) -> (String, String) {
    match name.split_once('.') {
        Some((schema, table)) if !schema.is_empty() && !table.is_empty() => {
            (unquote(schema), unquote(table))
        }
        _ => (active_schema.to_string(), unquote(name)),
    }
}

/// Strip one pair of surrounding double quotes.
fn unquote(name: &str) -> String {
    name.strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .unwrap_or(name)
        .to_string()
}

/// A single-quoted SQL string literal.
fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn interpret(input: &str, session: &mut Session) -> Result<Interpretation, SqlError> {
        Interpreter::new().interpret(input, session)
    }

    #[test]
    fn test_show_tables_uses_active_schema() {
        let mut session = Session::connected("shop");
        let result = interpret("show tables;", &mut session).unwrap();
        assert_eq!(
            result.text,
            "SELECT tablename FROM pg_tables WHERE schemaname = 'public';"
        );
        assert!(result.executable);
        assert!(!result.needs_qualification);
        assert!(!result.prompt_reset_required);
    }

    #[test]
    fn test_use_schema() {
        let mut session = Session::connected("shop");
        let result = interpret("use schema billing;", &mut session).unwrap();
        assert_eq!(session.schema(), "billing");
        assert_eq!(result.text, "Schema changed to billing");
        assert!(!result.executable);
        assert!(result.prompt_reset_required);
        assert_eq!(result.reconnect, None);

        let result = interpret("show tables;", &mut session).unwrap();
        assert!(result.text.contains("schemaname = 'billing'"));
    }

    #[test]
    fn test_use_schema_lowercases() {
        let mut session = Session::new();
        let result = interpret("USE SCHEMA Sales;", &mut session).unwrap();
        assert_eq!(session.schema(), "sales");
        assert_eq!(result.text, "Schema changed to sales");
    }

    #[test]
    fn test_use_database_requests_reconnect() {
        let mut session = Session::connected("shop");
        let result = interpret("use database analytics;", &mut session).unwrap();
        assert_eq!(result.reconnect.as_deref(), Some("analytics"));
        assert_eq!(result.text, "Database changed to analytics");
        assert!(!result.executable);
        assert!(result.prompt_reset_required);
        // Committed only after the reconnection succeeds.
        assert_eq!(session.database(), "shop");
    }

    #[test]
    fn test_errors_leave_session_untouched() {
        let mut session = Session::connected("shop").with_schema("sales");
        let before = session.clone();
        for input in ["use;", "use schema;", "use role x;", "show;", "describe;", ""] {
            assert!(interpret(input, &mut session).is_err(), "{input}");
            assert_eq!(session, before);
        }
    }

    #[test]
    fn test_describe_and_show_create() {
        let mut session = Session::new().with_schema("sales");

        let result = interpret("DESC Orders;", &mut session).unwrap();
        assert_eq!(
            result.text,
            "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
             WHERE table_schema = 'sales' AND table_name = 'Orders' ORDER BY ordinal_position;"
        );

        let result = interpret("describe billing.invoices;", &mut session).unwrap();
        assert!(result.text.contains("table_schema = 'billing' AND table_name = 'invoices'"));

        let result = interpret("show create table orders;", &mut session).unwrap();
        assert!(result.text.contains("string_agg("));
        assert!(result.text.contains("table_schema = 'sales' AND table_name = 'orders'"));
        assert!(result.executable);
        assert!(!result.needs_qualification);
    }

    #[test]
    fn test_literals_are_escaped() {
        let mut session = Session::new();
        let result = interpret("describe o'brien;", &mut session).unwrap();
        assert!(result.text.contains("table_name = 'o''brien'"));
    }

    #[test]
    fn test_show_schemas_and_databases() {
        let mut session = Session::new();
        assert_eq!(
            interpret("SHOW SCHEMAS;", &mut session).unwrap().text,
            "SELECT schema_name FROM information_schema.schemata;"
        );
        assert_eq!(
            interpret("show databases;", &mut session).unwrap().text,
            "SELECT datname FROM pg_database WHERE datistemplate = false;"
        );
    }

    #[test]
    fn test_pass_through() {
        let mut session = Session::new();
        let result = interpret("select * from orders;", &mut session).unwrap();
        assert_eq!(result.text, "select * from orders;");
        assert!(result.executable);
        assert!(result.needs_qualification);

        let result = interpret("GRANT SELECT ON orders TO bob;", &mut session).unwrap();
        assert!(!result.needs_qualification);
    }
}
