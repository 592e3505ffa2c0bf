//! CLI argument definitions using clap derive macros.

use clap::{Parser, Subcommand};

/// Schema migration CLI
///
/// Provisions and updates databases by driving the external SQL client.
#[derive(Parser, Debug)]
#[command(name = "dbup")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, populate from base snapshots, and update every enabled database
    Provision {
        /// Limit to one database kind (auth, world, characters, hotfixes)
        #[arg(short, long)]
        database: Option<String>,
    },

    /// Apply pending migrations only (no create/populate)
    Update {
        /// Limit to one database kind (auth, world, characters, hotfixes)
        #[arg(short, long)]
        database: Option<String>,
    },

    /// Run diagnostics
    Doctor,

    /// Show version
    Version,
}
