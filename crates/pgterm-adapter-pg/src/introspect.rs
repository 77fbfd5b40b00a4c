use regex::Regex;
use sqlx::postgres::PgRow;
use sqlx::{Executor, PgConnection, Row, ValueRef};

/// Who the server says we are, asked right after connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub user: String,
    pub database: String,
    /// Full `version()` string.
    pub version: String,
}

impl ServerInfo {
    /// `major.minor` from a `PostgreSQL 16.2 on ...` version string.
    pub fn version_number(&self) -> Option<String> {
        let re = Regex::new(r"PostgreSQL\s+(\d+(?:\.\d+)?)").ok()?;
        re.captures(&self.version)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// The short version when it can be found, the full string otherwise.
    pub fn display_version(&self) -> String {
        self.version_number()
            .unwrap_or_else(|| self.version.clone())
    }
}

/// Ask the server for the current user, database and version.
pub async fn introspect_server(conn: &mut PgConnection) -> anyhow::Result<ServerInfo> {
    let row = conn
        .fetch_one(sqlx::raw_sql("SELECT current_user, current_database(), version()"))
        .await?;

    Ok(ServerInfo {
        user: text_column(&row, 0)?,
        database: text_column(&row, 1)?,
        version: text_column(&row, 2)?,
    })
}

fn text_column(row: &PgRow, index: usize) -> anyhow::Result<String> {
    let value = row.try_get_raw(index)?;
    if value.is_null() {
        anyhow::bail!("server returned NULL for handshake column {index}");
    }
    value
        .as_str()
        .map(str::to_string)
        .map_err(|e| anyhow::anyhow!(e))
}
