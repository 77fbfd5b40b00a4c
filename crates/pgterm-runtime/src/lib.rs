//! # pgterm-runtime
//!
//! The statement pipeline behind the prompt. Each input line is interpreted,
//! qualified, checked by the safety guard and finally handed to a
//! [`Dispatcher`]. The dispatcher is the only part that talks to a database,
//! so the pipeline can run against an in-memory implementation in tests.

pub mod dispatcher;
pub mod error;
pub mod executor;

pub use dispatcher::{Dispatcher, QueryOutcome, QueryResult, ResultSet};
pub use error::RuntimeError;
pub use executor::{ExecutionReport, Executor, Output};
