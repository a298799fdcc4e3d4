// ABOUTME: Command line definition for points-probe
// ABOUTME: One subcommand per maintenance operation plus global output and logging flags

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand, ValueEnum};

use crate::commands::inspect::DEFAULT_PATTERN;
use crate::commands::POINTS_TABLE;

/// Inspect and maintain the points ledger tables
#[derive(Debug, Parser)]
#[command(name = "points-probe", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Env file to read DATABASE_URL from (defaults to ./.env when present)
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List tables whose name contains a pattern, with their columns
    Inspect {
        #[arg(long, default_value = DEFAULT_PATTERN)]
        pattern: String,
    },
    /// Show column types and nullability for one table
    Describe {
        #[arg(long, default_value = POINTS_TABLE)]
        table: String,
    },
    /// Print the newest challenges, transactions and points transactions
    Recent {
        /// Rows per table (overrides POINTS_PROBE_ROW_LIMIT)
        #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
        limit: Option<u32>,
    },
    /// Add the reason and blockchain_tx_hash columns to points_transactions when absent
    Migrate,
    /// Create points_transactions, or add its transaction_type column, when missing
    EnsureSchema,
    /// Insert one transaction reconciling a user's ledger balance
    Backfill {
        #[arg(long = "user", env = "USER_ID")]
        user_id: String,
        /// Apply the change instead of a dry run
        #[arg(long, env = "FORCE", value_parser = BoolishValueParser::new())]
        force: bool,
    },
    /// Recreate missing point awards from a user's notifications
    BackfillNotifications {
        #[arg(long = "user", env = "USER_ID")]
        user_id: String,
        /// Apply the inserts instead of a dry run
        #[arg(long, env = "FORCE", value_parser = BoolishValueParser::new())]
        force: bool,
    },
    /// Recompute a user's ledger row from their points transactions
    SyncLedger {
        #[arg(long = "user", env = "USER_ID")]
        user_id: String,
    },
}

impl Cli {
    /// Default log filter when POINTS_PROBE_LOG is unset
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::*;

    #[test]
    fn test_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["points-probe", "recent", "-n", "3", "--format", "json"])
            .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Command::Recent { limit: Some(3) }));
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn test_recent_rejects_zero_limit() {
        assert!(Cli::try_parse_from(["points-probe", "recent", "--limit", "0"]).is_err());
    }

    #[test]
    fn test_inspect_default_pattern() {
        let cli = Cli::try_parse_from(["points-probe", "inspect"]).unwrap();
        match cli.command {
            Command::Inspect { pattern } => assert_eq!(pattern, "points"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_backfill_flags() {
        let cli = Cli::try_parse_from([
            "points-probe",
            "-v",
            "backfill",
            "--user",
            "did:privy:abc",
            "--force",
        ])
        .unwrap();
        assert_eq!(cli.log_level(), "debug");
        match cli.command {
            Command::Backfill { user_id, force } => {
                assert_eq!(user_id, "did:privy:abc");
                assert!(force);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
