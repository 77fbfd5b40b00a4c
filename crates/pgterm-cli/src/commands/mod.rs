//! CLI command implementations for pgterm.

pub mod connect;
