//! CLI argument parsing for patternstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ps")]
#[command(author, version, about = "Inspect and maintain a quest pattern store", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Pattern store file (overrides config)
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List all patterns, best first
    List {
        /// Only show patterns with enough observations to be used
        #[arg(short, long)]
        established: bool,
    },

    /// Show one pattern in detail
    Show {
        /// Keyword to show
        #[arg(required = true)]
        keyword: String,
    },

    /// Show statistics for the store
    Stats,

    /// Remove a keyword
    Forget {
        /// Keyword to remove
        #[arg(required = true)]
        keyword: String,
    },

    /// Remove established patterns below a success rate
    Prune {
        /// Minimum success rate to keep (0.0 - 1.0); defaults to the config value
        #[arg(short, long)]
        min_rate: Option<f64>,
    },
}
