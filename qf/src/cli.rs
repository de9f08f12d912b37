//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// questfarm - unattended quest automation
#[derive(Debug, Parser)]
#[command(
    name = "qf",
    version,
    about = "Quest automation engine: farm state machine, quest classifier and command channel"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Account id (overrides config)
    #[arg(short, long, global = true)]
    pub account: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drive a farm session from a scripted scenario
    Run {
        /// Scenario YAML file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Wait one frame of wall time per tick
        #[arg(short, long)]
        realtime: bool,
    },

    /// Send a command to a running instance and print the response
    Send {
        /// Command token, e.g. `status` or `toggle auto`
        #[arg(required = true, num_args = 1..)]
        token: Vec<String>,
    },

    /// Show the last published status snapshot
    Status,

    /// Classify a quest text
    Classify {
        /// Quest text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_send_joins_later() {
        let cli = Cli::parse_from(["qf", "send", "toggle", "auto", "--account", "alt-07"]);
        assert_eq!(cli.account.as_deref(), Some("alt-07"));
        match cli.command {
            Command::Send { token } => assert_eq!(token, vec!["toggle", "auto"]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from(["qf", "-l", "debug", "run", "--scenario", "demo.yml", "--realtime"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Run { scenario, realtime } => {
                assert_eq!(scenario, PathBuf::from("demo.yml"));
                assert!(realtime);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
