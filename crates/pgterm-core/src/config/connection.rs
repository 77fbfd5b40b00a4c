//! Database connection configuration.
//!
//! Connection settings come from three places, highest precedence first:
//! 1. command-line flags and their environment variables
//! 2. the `connection` section of the config file
//! 3. the defaults below (`localhost:5432`, TLS preferred)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::ConfigError;

/// Environment variable consulted for a password when nothing else supplies one.
pub const PGPASSWORD_ENV: &str = "PGPASSWORD";

/// Configuration for the PostgreSQL connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Hostname of the Postgres server.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port of the Postgres server.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Role to authenticate as. Required before connecting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Database to connect to. Required before connecting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Password supplied directly (interactive prompt or tests).
    /// Never read from or written to the config file.
    #[serde(skip)]
    pub password: Option<String>,

    /// Environment variable containing the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// SSL mode for the connection.
    #[serde(default)]
    pub ssl_mode: SslMode,

    /// Trusted root certificate used to verify the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_root_cert: Option<PathBuf>,

    /// Client certificate presented to the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_cert: Option<PathBuf>,

    /// Key matching `ssl_cert`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_key: Option<PathBuf>,

    /// Seconds to wait for the server before giving up.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Reported to the server as `application_name`.
    #[serde(default = "default_application_name")]
    pub application_name: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            database: None,
            password: None,
            password_env: None,
            ssl_mode: SslMode::default(),
            ssl_root_cert: None,
            ssl_cert: None,
            ssl_key: None,
            connect_timeout_seconds: default_connect_timeout(),
            application_name: default_application_name(),
        }
    }
}

/// SSL mode for database connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    /// Disable SSL.
    Disable,
    /// Allow SSL but don't require it.
    Allow,
    /// Prefer SSL (default).
    #[default]
    Prefer,
    /// Require SSL.
    Require,
    /// Require SSL with CA verification.
    #[serde(rename = "verify-ca")]
    VerifyCa,
    /// Require SSL with full verification.
    #[serde(rename = "verify-full")]
    VerifyFull,
}

impl std::str::FromStr for SslMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disable" => Ok(SslMode::Disable),
            "allow" => Ok(SslMode::Allow),
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            "verify-ca" => Ok(SslMode::VerifyCa),
            "verify-full" => Ok(SslMode::VerifyFull),
            other => Err(ConfigError::Config(format!("unknown ssl mode '{other}'"))),
        }
    }
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SslMode::Disable => "disable",
            SslMode::Allow => "allow",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        };
        f.write_str(s)
    }
}

impl ConnectionConfig {
    /// Check that everything needed to connect is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username.as_deref().is_none_or(|u| u.trim().is_empty()) {
            return Err(ConfigError::Config(
                "username is required, use the -u flag".to_string(),
            ));
        }
        if self.database.as_deref().is_none_or(|d| d.trim().is_empty()) {
            return Err(ConfigError::Config(
                "database is required, use the -d flag".to_string(),
            ));
        }
        if self.ssl_key.is_some() != self.ssl_cert.is_some() {
            return Err(ConfigError::Config(
                "ssl_cert and ssl_key must be provided together".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the password: explicit value, then `password_env`, then `PGPASSWORD`.
    pub fn resolve_password(&self) -> Option<String> {
        if let Some(password) = &self.password {
            return Some(password.clone());
        }
        if let Some(env_var) = &self.password_env
            && let Ok(password) = std::env::var(env_var)
        {
            return Some(password);
        }
        std::env::var(PGPASSWORD_ENV).ok()
    }

    /// The same settings pointed at another database.
    pub fn for_database(&self, database: &str) -> Self {
        Self {
            database: Some(database.to_string()),
            ..self.clone()
        }
    }

    /// `user@host:port/database`, safe to log.
    pub fn target(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.username.as_deref().unwrap_or("?"),
            self.host,
            self.port,
            self.database.as_deref().unwrap_or("?")
        )
    }
}

// Default value functions
fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_application_name() -> String {
    "pgterm".to_string()
}
