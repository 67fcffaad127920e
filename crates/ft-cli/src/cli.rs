//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Focus time tracker.
///
/// Samples the foreground application once per second, keeps per-day usage
/// totals and raises a desktop notification when an application passes its
/// daily time limit.
#[derive(Debug, Parser)]
#[command(name = "ft", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Track the foreground application until interrupted.
    ///
    /// Send SIGUSR1 to archive today's usage and start over.
    Run,

    /// Show today's usage.
    Status,

    /// Show archived days, or one day's breakdown.
    History {
        /// Day to show (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Manage notification rules.
    #[command(subcommand)]
    Rules(RulesAction),
}

/// Rule management actions.
#[derive(Debug, Subcommand)]
pub enum RulesAction {
    /// List all rules.
    List,

    /// Add a daily time limit for an application.
    Add {
        /// Application name, matched case-insensitively.
        app: String,

        /// Daily limit in minutes.
        #[arg(long)]
        minutes: i64,

        /// Replace the generated alert text.
        #[arg(long)]
        message: Option<String>,
    },

    /// Remove a rule by ID (or unique ID prefix).
    Remove { id: String },

    /// Enable a rule by ID (or unique ID prefix).
    Enable { id: String },

    /// Disable a rule by ID (or unique ID prefix).
    Disable { id: String },

    /// Show the alerts an application would raise after a given time.
    Test {
        /// Application name.
        app: String,

        /// Simulated usage in minutes.
        #[arg(long)]
        minutes: i64,
    },
}
