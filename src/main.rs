mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use respawn::config::RespawnConfig;

#[derive(Parser)]
#[command(name = "respawn", version, about = "Reset a database to a clean state between test runs")]
struct Cli {
    /// Config file (defaults to ~/.respawn/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the configured path
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the deletion order and generated scripts without running them
    Plan {
        /// Emit the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every row from every in-scope table
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RespawnConfig::load_from(path)?,
        None => RespawnConfig::load()?,
    };
    if let Some(db) = cli.db {
        config.database.path = db;
    }

    // Log to stderr so stdout stays clean for `plan --json`.
    let filter = EnvFilter::try_new(&config.logging.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Plan { json } => cli::plan::plan(&config, json)?,
        Command::Reset { yes } => cli::reset::reset(&config, yes)?,
    }

    Ok(())
}
