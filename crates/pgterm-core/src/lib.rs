//! # pgterm-core
//!
//! Types shared by every pgterm crate:
//! - [`Session`]: the active schema and database of one connected session
//! - [`config`]: connection and shell configuration loaded from YAML

// Configuration types shared across all pgterm crates
pub mod config;
pub mod session;

pub use config::{ConfigError, ConnectionConfig, PgtermConfig, ShellConfig, SslMode};
pub use session::{DEFAULT_SCHEMA, Session, SessionError};
