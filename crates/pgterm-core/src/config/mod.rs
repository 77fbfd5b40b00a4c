//! Configuration types for pgterm.
//!
//! Configuration is optional. When present it is a single YAML file
//! (`~/.pgterm.yaml` unless another path is given) with two sections:
//!
//! - **connection**: server address, credentials source and TLS settings
//! - **shell**: history and the schema a session starts on
//!
//! Command-line flags override anything loaded here.

pub mod connection;
pub mod shell;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use connection::{ConnectionConfig, PGPASSWORD_ENV, SslMode};
pub use shell::ShellConfig;

/// Name of the configuration file looked up in the home directory.
pub const DEFAULT_CONFIG_FILE: &str = ".pgterm.yaml";

/// Complete pgterm configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PgtermConfig {
    /// Connection defaults.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// REPL settings.
    #[serde(default)]
    pub shell: ShellConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PgtermConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // An empty file deserializes to `()`, not to an empty mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load the configuration a session should start with.
    ///
    /// An explicit path must exist. Without one, `~/.pgterm.yaml` is used when
    /// present and the built-in defaults otherwise. Relative paths inside the
    /// file are resolved against the file's directory.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    tracing::debug!("No configuration file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        tracing::debug!(path = %path.display(), "Loading configuration");
        let mut config = Self::from_file(&path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        config.resolve_relative_paths(&base_dir);

        Ok(config)
    }

    fn resolve_relative_paths(&mut self, base_dir: &Path) {
        let resolve = |slot: &mut Option<PathBuf>| {
            if let Some(path) = slot
                && path.is_relative()
            {
                *path = base_dir.join(&*path);
            }
        };
        resolve(&mut self.connection.ssl_root_cert);
        resolve(&mut self.connection.ssl_cert);
        resolve(&mut self.connection.ssl_key);
        resolve(&mut self.shell.history_file);
    }
}

/// `~/.pgterm.yaml`, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
connection:
  host: db.internal
  port: 6432
  username: matt
  database: shop
  password_env: SHOP_PASSWORD
  ssl_mode: verify-full
  ssl_root_cert: /etc/ssl/root.crt
shell:
  max_history: 50
  default_schema: sales
"#;
        let config = PgtermConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.connection.host, "db.internal");
        assert_eq!(config.connection.port, 6432);
        assert_eq!(config.connection.username.as_deref(), Some("matt"));
        assert_eq!(config.connection.password_env.as_deref(), Some("SHOP_PASSWORD"));
        assert_eq!(config.connection.ssl_mode, SslMode::VerifyFull);
        assert_eq!(config.shell.max_history, 50);
        assert_eq!(config.shell.default_schema, "sales");
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = PgtermConfig::from_yaml("shell:\n  max_history: 10\n").unwrap();
        assert_eq!(config.connection.host, "localhost");
        assert_eq!(config.connection.port, 5432);
        assert_eq!(config.shell.default_schema, "public");

        let config = PgtermConfig::from_yaml("").unwrap();
        assert_eq!(config.shell.max_history, 1000);
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let err = PgtermConfig::from_yaml("connection:\n  port: not-a-port\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = PgtermConfig::load(Some(Path::new("/nonexistent/pgterm.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pgterm.yaml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "connection:\n  ssl_root_cert: certs/root.crt\nshell:\n  history_file: /tmp/absolute_history"
        )
        .unwrap();

        let config = PgtermConfig::load(Some(&path)).unwrap();
        assert_eq!(
            config.connection.ssl_root_cert,
            Some(dir.path().join("certs/root.crt"))
        );
        assert_eq!(
            config.shell.history_file,
            Some(PathBuf::from("/tmp/absolute_history"))
        );
    }
}
