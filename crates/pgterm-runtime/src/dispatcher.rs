use async_trait::async_trait;
use std::time::Duration;

/// Rows returned by a statement, rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    /// `None` is SQL `NULL`.
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    Rows(ResultSet),
    Affected(u64),
}

/// What the database answered and how long it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub result: QueryResult,
    pub elapsed: Duration,
}

/// Executes final SQL against the connected database.
///
/// Calls are strictly sequential; the executor never issues a statement while
/// another is in flight.
#[async_trait]
pub trait Dispatcher: Send {
    /// Run `sql` and collect its rows or affected-row count.
    async fn dispatch(&mut self, sql: &str) -> anyhow::Result<QueryOutcome>;

    /// Replace the connection with one to `database`.
    ///
    /// Returns the database the server reports as current. On error the
    /// existing connection must still be usable.
    async fn reconnect(&mut self, database: &str) -> anyhow::Result<String>;

    /// Close the connection.
    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
