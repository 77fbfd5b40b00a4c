//! `pgterm connect` command implementation.
//!
//! Merges flags over the configuration file, opens the connection and hands
//! the session to the interactive shell.

use anyhow::{Context, Result};
use clap::{ArgAction, Args};
use std::path::{Path, PathBuf};

use pgterm_adapter_pg::PostgresDispatcher;
use pgterm_core::{PgtermConfig, Session, SslMode};
use pgterm_runtime::Executor;

use crate::prompter::TerminalPrompter;
use crate::{help, shell};

/// Connection flags. `-h` is the host, so help is only available as `--help`.
#[derive(Args, Debug)]
#[command(disable_help_flag = true)]
pub struct ConnectArgs {
    /// Server host [default: localhost]
    #[arg(short = 'h', long, env = "PGHOST")]
    pub host: Option<String>,

    /// Server port [default: 5432]
    #[arg(short = 'P', long, env = "PGPORT")]
    pub port: Option<u16>,

    /// Role to connect as
    #[arg(short = 'u', long, env = "PGUSER")]
    pub username: Option<String>,

    /// Database to connect to
    #[arg(short = 'd', long, env = "PGDATABASE")]
    pub database: Option<String>,

    /// Prompt for a password
    #[arg(short = 'p', long, default_value_t = false)]
    pub password: bool,

    /// Schema to start on [default: public]
    #[arg(long)]
    pub schema: Option<String>,

    /// disable, allow, prefer, require, verify-ca or verify-full
    #[arg(long)]
    pub ssl_mode: Option<SslMode>,

    /// Root certificate used to verify the server
    #[arg(long)]
    pub ssl_root_cert: Option<PathBuf>,

    /// Client certificate
    #[arg(long)]
    pub ssl_cert: Option<PathBuf>,

    /// Client key
    #[arg(long)]
    pub ssl_key: Option<PathBuf>,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

impl ConnectArgs {
    /// Overlay the flags that were given onto `config`.
    fn apply(self, config: &mut PgtermConfig) {
        let conn = &mut config.connection;
        if let Some(host) = self.host {
            conn.host = host;
        }
        if let Some(port) = self.port {
            conn.port = port;
        }
        if self.username.is_some() {
            conn.username = self.username;
        }
        if self.database.is_some() {
            conn.database = self.database;
        }
        if let Some(mode) = self.ssl_mode {
            conn.ssl_mode = mode;
        }
        if self.ssl_root_cert.is_some() {
            conn.ssl_root_cert = self.ssl_root_cert;
        }
        if self.ssl_cert.is_some() {
            conn.ssl_cert = self.ssl_cert;
        }
        if self.ssl_key.is_some() {
            conn.ssl_key = self.ssl_key;
        }
        if let Some(schema) = self.schema {
            config.shell.default_schema = schema;
        }
    }
}

pub async fn run(args: ConnectArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = PgtermConfig::load(config_path).context("failed to load configuration")?;
    let prompt_password = args.password;
    args.apply(&mut config);

    // Fail on missing flags before asking for a password.
    config.connection.validate()?;
    if prompt_password {
        let password =
            rpassword::prompt_password("Enter password: ").context("failed to read password")?;
        config.connection.password = Some(password);
    }

    let dispatcher = PostgresDispatcher::connect(config.connection.clone())
        .await
        .context("Connection error")?;

    let server = dispatcher.server().clone();
    println!("{}", help::banner(&server));

    let session = Session::connected(server.database.as_str())
        .with_schema(&config.shell.default_schema);
    let executor = Executor::new(dispatcher, TerminalPrompter::new(), session);

    shell::run(executor, &config.shell).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ConnectArgs,
    }

    fn parse(argv: &[&str]) -> ConnectArgs {
        let mut full = vec!["connect"];
        full.extend_from_slice(argv);
        Harness::try_parse_from(full).unwrap().args
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = PgtermConfig::from_yaml(
            "connection:\n  host: from-file\n  password_env: SHOP_PASSWORD\n  ssl_mode: disable\nshell:\n  default_schema: sales\n",
        )
        .unwrap();

        parse(&["-h", "from-flag", "-d", "shop", "--ssl-mode", "require"]).apply(&mut config);

        assert_eq!(config.connection.host, "from-flag");
        assert_eq!(config.connection.password_env.as_deref(), Some("SHOP_PASSWORD"));
        assert_eq!(config.connection.database.as_deref(), Some("shop"));
        assert_eq!(config.connection.ssl_mode, SslMode::Require);
        assert_eq!(config.shell.default_schema, "sales");
    }

    #[test]
    fn test_schema_flag() {
        let mut config = PgtermConfig::default();
        parse(&["--schema", "billing"]).apply(&mut config);
        assert_eq!(config.shell.default_schema, "billing");
    }

    #[test]
    fn test_bad_ssl_mode_is_rejected() {
        let result = Harness::try_parse_from(["connect", "--ssl-mode", "sometimes"]);
        assert!(result.is_err());
    }
}
