//! dbup - schema migration CLI.
//!
//! Provisions and updates a fixed set of databases by driving the external
//! SQL client: fresh databases are created and populated from base snapshots,
//! then pending versioned migrations are applied in deterministic order.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod config;
mod pool;
mod prompt;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("dbup=info".parse()?)
                .add_directive("dbup_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load()?;

    // Execute command
    match cli.command {
        Commands::Provision { database } => commands::provision::execute(database.as_deref(), &config),
        Commands::Update { database } => commands::update::execute(database.as_deref(), &config),
        Commands::Doctor => commands::doctor::execute(&config),
        Commands::Version => {
            println!("dbup {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
