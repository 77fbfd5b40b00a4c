//! # pgterm-sql
//!
//! Decision logic between the operator's keyboard and the database:
//! - classify an input line into a pseudo-command or pass-through SQL
//! - qualify unqualified table references with the active schema
//! - hold unfiltered `UPDATE`/`DELETE` statements until they are confirmed
//!
//! ## Pseudo-commands
//!
//! | Input | Effect |
//! |-------|--------|
//! | `SHOW SCHEMAS` | list schemas |
//! | `SHOW TABLES` | list tables of the active schema |
//! | `SHOW DATABASES` | list non-template databases |
//! | `SHOW CREATE TABLE t` | rebuild a `CREATE TABLE` from column metadata |
//! | `DESCRIBE t` / `DESC t` | column names, types and nullability |
//! | `USE SCHEMA s` | switch the active schema |
//! | `USE DATABASE d` | reconnect to another database |
//!
//! Everything else is sent to the server, qualified first unless it is a
//! `GRANT` or a `CREATE`/`ALTER` of something other than a table.

pub mod command;
pub mod error;
pub mod guard;
pub mod interpreter;
pub mod parser;
pub mod qualifier;

pub use command::{Command, ShowTarget, UseTarget};
pub use error::{QUERY_CANCELLED, SqlError};
pub use guard::{FixedAnswer, GuardDecision, Inspection, MutationKind, Prompter};
pub use interpreter::{Interpretation, Interpreter};
pub use parser::{SqlAnalyzer, SqlOperation, TableReference};
pub use qualifier::{Qualification, SchemaQualifier};
