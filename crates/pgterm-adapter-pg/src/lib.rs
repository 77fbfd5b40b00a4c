use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use futures::TryStreamExt;
use pgterm_core::{ConnectionConfig, SslMode};
use pgterm_runtime::{Dispatcher, QueryOutcome, QueryResult, ResultSet};
use sqlx::postgres::{PgConnectOptions, PgRow, PgSslMode};
use sqlx::{Column, Connection, Either, PgConnection, Row, ValueRef};

pub mod introspect;

pub use introspect::ServerInfo;

/// Statement prefixes whose results are rows rather than a count.
const ROW_RETURNING_PREFIXES: [&str; 6] = ["SELECT", "WITH", "SHOW", "EXPLAIN", "VALUES", "TABLE"];

/// A single PostgreSQL connection driven one statement at a time.
pub struct PostgresDispatcher {
    conn: Option<PgConnection>,
    config: ConnectionConfig,
    server: ServerInfo,
}

impl PostgresDispatcher {
    /// Connect with `config` and read the server's identity.
    pub async fn connect(config: ConnectionConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let (conn, server) = open(&config).await?;
        Ok(Self {
            conn: Some(conn),
            config,
            server,
        })
    }

    /// Identity reported by the server for the current connection.
    pub fn server(&self) -> &ServerInfo {
        &self.server
    }

    fn connection(&mut self) -> anyhow::Result<&mut PgConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("connection is closed"))
    }
}

#[async_trait]
impl Dispatcher for PostgresDispatcher {
    async fn dispatch(&mut self, sql: &str) -> anyhow::Result<QueryOutcome> {
        let conn = self.connection()?;
        let started = Instant::now();

        // The simple query protocol accepts several statements at once and
        // returns every value as text.
        let mut stream = sqlx::raw_sql(sql).fetch_many(&mut *conn);
        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<Option<String>>> = Vec::new();
        let mut affected: u64 = 0;

        while let Some(item) = stream.try_next().await? {
            match item {
                Either::Left(done) => affected += done.rows_affected(),
                Either::Right(row) => {
                    if columns.is_empty() {
                        columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    rows.push(row_to_text(&row)?);
                }
            }
        }
        drop(stream);
        let elapsed = started.elapsed();

        let result = if !rows.is_empty() || returns_rows(sql) {
            QueryResult::Rows(ResultSet { columns, rows })
        } else {
            QueryResult::Affected(affected)
        };

        tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "Statement finished");
        Ok(QueryOutcome { result, elapsed })
    }

    async fn reconnect(&mut self, database: &str) -> anyhow::Result<String> {
        let config = self.config.for_database(database);
        // The old connection stays open until the new one is usable.
        let (conn, server) = open(&config).await?;

        if let Some(old) = self.conn.replace(conn) {
            if let Err(e) = old.close().await {
                tracing::warn!(error = %e, "Failed to close previous connection");
            }
        }
        self.config = config;
        self.server = server;
        Ok(self.server.database.clone())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await.context("failed to close connection")?;
            tracing::info!(server = %self.config.target(), "Connection closed");
        }
        Ok(())
    }
}

async fn open(config: &ConnectionConfig) -> anyhow::Result<(PgConnection, ServerInfo)> {
    let options = connect_options(config);
    let timeout = Duration::from_secs(config.connect_timeout_seconds);

    tracing::info!(server = %config.target(), ssl_mode = %config.ssl_mode, "Connecting");
    let mut conn = tokio::time::timeout(timeout, PgConnection::connect_with(&options))
        .await
        .with_context(|| format!("timed out connecting to {}", config.target()))?
        .with_context(|| format!("failed to connect to {}", config.target()))?;

    let server = introspect::introspect_server(&mut conn)
        .await
        .context("failed to read server identity")?;
    tracing::info!(user = %server.user, database = %server.database, "Connected");
    Ok((conn, server))
}

/// Translate connection settings into sqlx options.
pub fn connect_options(config: &ConnectionConfig) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .ssl_mode(ssl_mode(config.ssl_mode))
        .application_name(&config.application_name);

    if let Some(username) = &config.username {
        options = options.username(username);
    }
    if let Some(database) = &config.database {
        options = options.database(database);
    }
    if let Some(password) = config.resolve_password() {
        options = options.password(&password);
    }
    if let Some(root) = &config.ssl_root_cert {
        options = options.ssl_root_cert(root);
    }
    if let Some(cert) = &config.ssl_cert {
        options = options.ssl_client_cert(cert);
    }
    if let Some(key) = &config.ssl_key {
        options = options.ssl_client_key(key);
    }
    options
}

fn ssl_mode(mode: SslMode) -> PgSslMode {
    match mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Allow => PgSslMode::Allow,
        SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require => PgSslMode::Require,
        SslMode::VerifyCa => PgSslMode::VerifyCa,
        SslMode::VerifyFull => PgSslMode::VerifyFull,
    }
}

/// Whether a statement's results are rows even when there are none.
pub fn returns_rows(sql: &str) -> bool {
    let sql_upper = sql.trim_start().to_uppercase();
    ROW_RETURNING_PREFIXES
        .iter()
        .any(|prefix| sql_upper.starts_with(prefix))
        || sql_upper.contains("RETURNING")
}

fn row_to_text(row: &PgRow) -> anyhow::Result<Vec<Option<String>>> {
    (0..row.len())
        .map(|i| -> anyhow::Result<Option<String>> {
            let value = row.try_get_raw(i)?;
            if value.is_null() {
                return Ok(None);
            }
            let text = value
                .as_str()
                .map_err(|e| anyhow::anyhow!("column {i}: {e}"))?;
            Ok(Some(text.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("SELECT 1"));
        assert!(returns_rows("  with x as (select 1) select * from x"));
        assert!(returns_rows("EXPLAIN SELECT 1"));
        assert!(returns_rows("show search_path"));
        assert!(returns_rows("INSERT INTO t VALUES (1) RETURNING id"));
        assert!(!returns_rows("DELETE FROM t WHERE id = 1"));
        assert!(!returns_rows("CREATE TABLE t (id INT)"));
    }

    #[test]
    fn test_connect_options() {
        let config = ConnectionConfig {
            host: "db.internal".to_string(),
            port: 6432,
            username: Some("matt".to_string()),
            database: Some("shop".to_string()),
            password: Some("secret".to_string()),
            ssl_mode: SslMode::Require,
            ..Default::default()
        };
        let options = connect_options(&config);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6432);
        assert_eq!(options.get_username(), "matt");
        assert_eq!(options.get_database(), Some("shop"));
        assert!(matches!(options.get_ssl_mode(), PgSslMode::Require));
        assert_eq!(options.get_application_name(), Some("pgterm"));
    }

    #[test]
    fn test_ssl_mode_mapping() {
        assert!(matches!(ssl_mode(SslMode::Disable), PgSslMode::Disable));
        assert!(matches!(ssl_mode(SslMode::VerifyFull), PgSslMode::VerifyFull));
    }

    #[tokio::test]
    async fn test_connect_rejects_incomplete_config() {
        let result = PostgresDispatcher::connect(ConnectionConfig::default()).await;
        let err = result.err().unwrap();
        assert!(err.to_string().contains("username"));
    }
}
