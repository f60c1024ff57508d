//! # Keweave CLI Module
//!
//! This module implements the CLI interface for Keweave.
//!
//! ## Available Commands
//!
//! - `plan` - Build and print the reasoning plan for the goal
//! - `run` - Execute the plan against the network's knowledge bases
//! - `gaps` - Report the knowledge gaps of the goal
//! - `rules` - List the rules derived from the network

mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use keweave_core::{KeweaveError, MatchStrategy, ReasonerConfig};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Keweave - Knowledge Network Reasoner
///
/// Answers a goal over a network of knowledge bases by matching it against
/// their capabilities and chaining through domain rules.
#[derive(Parser, Debug)]
#[command(name = "keweave")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Settings that override the `[reasoner]` table of the network file.
#[derive(clap::Args, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Matching strategy (entry, normal, advanced, ultra, supreme)
    #[arg(short, long)]
    pub strategy: Option<MatchStrategy>,

    /// Maximum number of reasoning rounds
    #[arg(long)]
    pub max_rounds: Option<usize>,

    /// Per-round handler timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl Overrides {
    /// Replace the fields of `config` given on the command line.
    #[must_use]
    pub fn apply(self, config: ReasonerConfig) -> ReasonerConfig {
        ReasonerConfig {
            strategy: self.strategy.unwrap_or(config.strategy),
            max_rounds: self.max_rounds.unwrap_or(config.max_rounds),
            round_timeout_ms: self.timeout_ms.or(config.round_timeout_ms),
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the reasoning plan
    Plan {
        /// Path to the network file (TOML)
        #[arg(short, long)]
        file: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Answer the goal
    Run {
        /// Path to the network file (TOML)
        #[arg(short, long)]
        file: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Report knowledge gaps of the goal
    Gaps {
        /// Path to the network file (TOML)
        #[arg(short, long)]
        file: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// List the rules derived from the network
    Rules {
        /// Path to the network file (TOML)
        #[arg(short, long)]
        file: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), KeweaveError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Plan { file, overrides }) => cmd_plan(&file, overrides, json_mode),
        Some(Commands::Run { file, overrides }) => {
            cmd_run(&file, overrides, json_mode, cli.verbose).await
        }
        Some(Commands::Gaps { file, overrides }) => cmd_gaps(&file, overrides, json_mode),
        Some(Commands::Rules { file }) => cmd_rules(&file, json_mode),
        None => Cli::command()
            .print_help()
            .map_err(|e| KeweaveError::Io(format!("Cannot print help: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides_parse() {
        let cli = Cli::try_parse_from([
            "keweave",
            "run",
            "-f",
            "network.toml",
            "--strategy",
            "Supreme",
            "--max-rounds",
            "8",
        ])
        .expect("parse");

        let overrides = match cli.command {
            Some(Commands::Run { overrides, .. }) => Some(overrides),
            _ => None,
        };
        assert_eq!(
            overrides,
            Some(Overrides {
                strategy: Some(MatchStrategy::Supreme),
                max_rounds: Some(8),
                timeout_ms: None,
            })
        );
    }
}
