use std::fmt;
use std::time::Duration;

use pgterm_core::Session;
use pgterm_sql::guard::{self, GuardDecision, Prompter};
use pgterm_sql::{Interpreter, SchemaQualifier, SqlError};

use crate::dispatcher::{Dispatcher, QueryResult, ResultSet};
use crate::error::RuntimeError;

/// What one input line produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// A session-only command finished locally.
    Message(String),
    /// A statement returned rows.
    Rows { result: ResultSet, elapsed: Duration },
    /// A statement changed rows.
    Affected { count: u64, elapsed: Duration },
}

impl Output {
    /// The line printed after any rendered table.
    pub fn summary(&self) -> String {
        match self {
            Output::Message(text) => text.clone(),
            Output::Rows { result, elapsed } => format!(
                "{} rows returned in set ({:.3} Sec)",
                result.row_count(),
                elapsed.as_secs_f64()
            ),
            Output::Affected { count, .. } => format!("{count} rows affected"),
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub output: Output,
    /// The prompt must be rebuilt before the next line.
    pub prompt_reset: bool,
    /// The statement that reached the database, if any.
    pub dispatched_sql: Option<String>,
}

/// Runs input lines through interpretation, qualification, the safety guard
/// and the dispatcher, in that order.
pub struct Executor<D: Dispatcher, P: Prompter> {
    dispatcher: D,
    prompter: P,
    session: Session,
    interpreter: Interpreter,
    qualifier: SchemaQualifier,
}

impl<D: Dispatcher, P: Prompter> Executor<D, P> {
    pub fn new(dispatcher: D, prompter: P, session: Session) -> Self {
        Self {
            dispatcher,
            prompter,
            session,
            interpreter: Interpreter::new(),
            qualifier: SchemaQualifier::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Process one complete, `;`-terminated input line.
    pub async fn execute(&mut self, input: &str) -> Result<ExecutionReport, RuntimeError> {
        let interpretation = self.interpreter.interpret(input, &mut self.session)?;

        if let Some(database) = interpretation.reconnect {
            let reported = self
                .dispatcher
                .reconnect(&database)
                .await
                .map_err(|error| RuntimeError::Reconnect {
                    database: database.clone(),
                    error,
                })?;
            self.session.set_database(&reported)?;
            tracing::info!(database = %self.session.database(), "Switched database");
            return Ok(ExecutionReport {
                output: Output::Message(format!("Database changed to {}", self.session.database())),
                prompt_reset: true,
                dispatched_sql: None,
            });
        }

        if !interpretation.executable {
            return Ok(ExecutionReport {
                output: Output::Message(interpretation.text),
                prompt_reset: interpretation.prompt_reset_required,
                dispatched_sql: None,
            });
        }

        let sql = if interpretation.needs_qualification {
            self.qualifier
                .qualify(&interpretation.text, self.session.schema())?
                .rewritten_sql
        } else {
            interpretation.text
        };

        if let GuardDecision::Abort(reason) = guard::evaluate(&sql, &mut self.prompter) {
            return Err(SqlError::SafetyAbort { reason }.into());
        }

        tracing::debug!(sql = %sql, "Dispatching statement");
        let outcome = self
            .dispatcher
            .dispatch(&sql)
            .await
            .map_err(RuntimeError::Execution)?;

        let output = match outcome.result {
            QueryResult::Rows(result) => Output::Rows {
                result,
                elapsed: outcome.elapsed,
            },
            QueryResult::Affected(count) => Output::Affected {
                count,
                elapsed: outcome.elapsed,
            },
        };

        Ok(ExecutionReport {
            output,
            prompt_reset: interpretation.prompt_reset_required,
            dispatched_sql: Some(sql),
        })
    }

    /// Close the connection and give back the dispatcher.
    pub async fn shutdown(mut self) -> anyhow::Result<D> {
        self.dispatcher.close().await?;
        Ok(self.dispatcher)
    }
}
