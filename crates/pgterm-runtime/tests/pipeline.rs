//! End-to-end tests of the statement pipeline.
//!
//! The database is replaced by an in-memory dispatcher that records every
//! statement it receives, and confirmations come from a scripted prompter.
//!
//! Run with: cargo test --package pgterm-runtime --test pipeline

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use pgterm_core::Session;
use pgterm_runtime::{
    Dispatcher, Executor, Output, QueryOutcome, QueryResult, ResultSet, RuntimeError,
};
use pgterm_sql::{Prompter, SqlError};
use pretty_assertions::assert_eq;

#[derive(Default)]
struct RecordingDispatcher {
    dispatched: Vec<String>,
    databases: Vec<String>,
    closed: bool,
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&mut self, sql: &str) -> anyhow::Result<QueryOutcome> {
        self.dispatched.push(sql.to_string());
        if sql.contains("broken") {
            anyhow::bail!("relation \"broken\" does not exist");
        }
        let upper = sql.to_uppercase();
        let result = if upper.starts_with("SELECT") {
            QueryResult::Rows(ResultSet {
                columns: vec!["tablename".to_string()],
                rows: vec![vec![Some("orders".to_string())], vec![None]],
            })
        } else {
            QueryResult::Affected(4)
        };
        Ok(QueryOutcome {
            result,
            elapsed: Duration::from_millis(12),
        })
    }

    async fn reconnect(&mut self, database: &str) -> anyhow::Result<String> {
        if self.databases.iter().any(|d| d == database) {
            Ok(database.to_string())
        } else {
            anyhow::bail!("database \"{database}\" does not exist")
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Answers confirmations from a fixed script and counts the questions.
struct ScriptedPrompter {
    answers: VecDeque<bool>,
    asked: usize,
}

impl ScriptedPrompter {
    fn new(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            asked: 0,
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, _message: &str) -> io::Result<bool> {
        self.asked += 1;
        self.answers
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted answer"))
    }
}

fn executor(answers: &[bool]) -> Executor<RecordingDispatcher, ScriptedPrompter> {
    let dispatcher = RecordingDispatcher {
        databases: vec!["shop".to_string(), "analytics".to_string()],
        ..Default::default()
    };
    Executor::new(dispatcher, ScriptedPrompter::new(answers), Session::connected("shop"))
}

/// `show tables;` under the default schema sends the catalog query unchanged.
#[tokio::test]
async fn test_show_tables_dispatches_catalog_query() {
    let mut executor = executor(&[]);
    let report = executor.execute("show tables;").await.unwrap();

    assert_eq!(
        executor.dispatcher().dispatched,
        vec!["SELECT tablename FROM pg_tables WHERE schemaname = 'public';".to_string()]
    );
    assert_eq!(report.output.summary(), "2 rows returned in set (0.012 Sec)");
    assert!(!report.prompt_reset);
}

/// `USE SCHEMA` is handled locally and changes what later commands target.
#[tokio::test]
async fn test_use_schema_propagates_to_show_tables() {
    let mut executor = executor(&[]);

    let report = executor.execute("use schema billing;").await.unwrap();
    assert_eq!(report.output, Output::Message("Schema changed to billing".to_string()));
    assert!(report.prompt_reset);
    assert!(executor.dispatcher().dispatched.is_empty());

    executor.execute("SHOW TABLES;").await.unwrap();
    assert_eq!(
        executor.dispatcher().dispatched,
        vec!["SELECT tablename FROM pg_tables WHERE schemaname = 'billing';".to_string()]
    );
}

/// Plain SQL is qualified with the active schema before dispatch.
#[tokio::test]
async fn test_select_is_qualified() {
    let mut executor = executor(&[]);
    executor.execute("use schema sales;").await.unwrap();
    let report = executor.execute("select * from orders;").await.unwrap();

    assert_eq!(
        report.dispatched_sql.as_deref(),
        Some("SELECT * FROM sales.orders;")
    );
}

/// Already-qualified statements reach the database byte for byte.
#[tokio::test]
async fn test_qualified_statement_is_untouched() {
    let mut executor = executor(&[]);
    let sql = "select  id from billing.invoices where id = 1;";
    executor.execute(sql).await.unwrap();

    assert_eq!(executor.dispatcher().dispatched, vec![sql.to_string()]);
}

/// A declined unfiltered DELETE is never sent.
#[tokio::test]
async fn test_declined_delete_is_not_dispatched() {
    let mut executor = executor(&[false]);
    let err = executor.execute("delete from accounts;").await.unwrap_err();

    assert!(err.is_safety_abort());
    assert_eq!(err.to_string(), "Safe choice. Query cancelled");
    assert!(executor.dispatcher().dispatched.is_empty());
}

/// A confirmed unfiltered UPDATE goes through.
#[tokio::test]
async fn test_confirmed_update_is_dispatched() {
    let mut executor = executor(&[true]);
    let report = executor
        .execute("update accounts set active = false;")
        .await
        .unwrap();

    assert_eq!(report.output.summary(), "4 rows affected");
    assert_eq!(
        executor.dispatcher().dispatched,
        vec!["UPDATE public.accounts SET active = false;".to_string()]
    );
}

/// Filtered mutations never reach the prompter; the script is empty, so any
/// question would abort.
#[tokio::test]
async fn test_filtered_delete_never_prompts() {
    let mut executor = executor(&[]);
    let report = executor
        .execute("delete from accounts where id = 7;")
        .await
        .unwrap();

    assert_eq!(report.output.summary(), "4 rows affected");
    assert_eq!(executor.dispatcher().dispatched.len(), 1);
}

/// A successful `USE DATABASE` reconnects and records the new database but
/// keeps the schema.
#[tokio::test]
async fn test_use_database_switches_after_reconnect() {
    let mut executor = executor(&[]);
    executor.execute("use schema sales;").await.unwrap();
    let report = executor.execute("use database analytics;").await.unwrap();

    assert_eq!(
        report.output,
        Output::Message("Database changed to analytics".to_string())
    );
    assert!(report.prompt_reset);
    assert_eq!(executor.session().database(), "analytics");
    assert_eq!(executor.session().schema(), "sales");
}

/// A failed reconnect leaves the session on the old database.
#[tokio::test]
async fn test_failed_reconnect_keeps_session() {
    let mut executor = executor(&[]);
    let err = executor.execute("use database nowhere;").await.unwrap_err();

    assert!(matches!(err, RuntimeError::Reconnect { .. }));
    assert!(err.to_string().contains("nowhere"));
    assert_eq!(executor.session().database(), "shop");
}

/// Interpreter errors stop the line before anything is sent.
#[tokio::test]
async fn test_interpreter_errors_are_line_local() {
    let mut executor = executor(&[]);

    let err = executor.execute("describe;").await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Sql(SqlError::MissingArgument { .. })
    ));

    let err = executor.execute("show indexes;").await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Sql(SqlError::UnsupportedCommand { .. })
    ));

    let err = executor.execute("select * from orders where;").await.unwrap_err();
    assert!(matches!(err, RuntimeError::Sql(SqlError::InvalidSql(_))));

    assert!(executor.dispatcher().dispatched.is_empty());
    assert_eq!(executor.session().schema(), "public");
}

/// Maintenance statements the SQL grammar does not cover still reach the
/// server, as typed.
#[tokio::test]
async fn test_maintenance_statements_pass_through() {
    let mut executor = executor(&[]);
    executor.execute("use schema sales;").await.unwrap();

    executor.execute("VACUUM orders;").await.unwrap();
    executor.execute("refresh materialized view order_totals;").await.unwrap();
    executor.execute("CLUSTER orders;").await.unwrap();

    assert_eq!(
        executor.dispatcher().dispatched,
        vec![
            "VACUUM orders;".to_string(),
            "refresh materialized view order_totals;".to_string(),
            "CLUSTER orders;".to_string(),
        ]
    );
}

/// Database errors are reported and the next line still runs.
#[tokio::test]
async fn test_execution_error_then_recovery() {
    let mut executor = executor(&[]);

    let err = executor.execute("select * from broken;").await.unwrap_err();
    assert!(matches!(err, RuntimeError::Execution(_)));
    assert!(err.to_string().contains("does not exist"));

    executor.execute("select 1;").await.unwrap();
    assert_eq!(executor.dispatcher().dispatched.len(), 2);
}

/// Shutting down closes the connection.
#[tokio::test]
async fn test_shutdown_closes_dispatcher() {
    let executor = executor(&[]);
    let dispatcher = executor.shutdown().await.unwrap();
    assert!(dispatcher.closed);
}
