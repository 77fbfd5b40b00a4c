//! Interactive shell settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::session::DEFAULT_SCHEMA;

/// Settings for the REPL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Where command history is kept. Defaults to `~/.pgterm_history`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_file: Option<PathBuf>,

    /// Maximum number of history entries.
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Schema selected when the session starts.
    #[serde(default = "default_schema")]
    pub default_schema: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            history_file: None,
            max_history: default_max_history(),
            default_schema: default_schema(),
        }
    }
}

impl ShellConfig {
    /// The configured history file, or `.pgterm_history` in the home directory.
    pub fn history_path(&self) -> PathBuf {
        if let Some(path) = &self.history_file {
            return path.clone();
        }
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".pgterm_history"))
            .unwrap_or_else(|| PathBuf::from(".pgterm_history"))
    }
}

fn default_max_history() -> usize {
    1000
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}
