use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod help;
mod prompter;
mod render;
mod shell;

use commands::connect::ConnectArgs;

#[derive(Parser, Debug)]
#[command(name = "pgterm", version, about = "Interactive PostgreSQL terminal client")]
struct Cli {
    /// Configuration file (defaults to ~/.pgterm.yaml when present)
    #[arg(long, global = true, env = "PGTERM_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter for diagnostics on stderr, e.g. `debug` or `pgterm_sql=trace`
    #[arg(long, global = true, env = "RUST_LOG", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to a PostgreSQL server and start an interactive session.
    Connect(ConnectArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Connect(args) => commands::connect::run(args, cli.config.as_deref()).await?,
    }

    Ok(())
}
