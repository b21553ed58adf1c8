//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// License-server log analytics.
///
/// Parses a license daemon's activity log into usage sessions, rollups,
/// and capacity-planning signals, and reads and writes license options
/// files.
#[derive(Debug, Parser)]
#[command(name = "lmlog", version, about, long_about = None)]
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
    /// Analyze a log and print the usage report.
    Report {
        /// Path to the license-server log file.
        log: PathBuf,

        /// Restrict the report to one user's sessions and denials.
        #[arg(long)]
        user: Option<String>,

        /// Restrict the report to one feature.
        #[arg(long)]
        feature: Option<String>,

        /// Emit JSON instead of the human-readable report.
        #[arg(long)]
        json: bool,
    },

    /// List reconstructed usage sessions.
    Sessions {
        /// Path to the license-server log file.
        log: PathBuf,

        /// Only sessions for this user.
        #[arg(long)]
        user: Option<String>,

        /// Only sessions for this feature.
        #[arg(long)]
        feature: Option<String>,

        /// Emit JSON instead of the session table.
        #[arg(long)]
        json: bool,
    },

    /// List interpreted log events for auditing.
    Events {
        /// Path to the license-server log file.
        log: PathBuf,

        /// Only events of this kind (e.g. checkout, denied, error).
        #[arg(long)]
        kind: Option<String>,

        /// Emit JSON instead of the event listing.
        #[arg(long)]
        json: bool,
    },

    /// Classify per-feature capacity and estimate expansion ROI.
    Capacity {
        /// Path to the license-server log file.
        log: PathBuf,

        /// Emit JSON instead of the capacity table.
        #[arg(long)]
        json: bool,
    },

    /// Inspect or rewrite license options files.
    Options {
        #[command(subcommand)]
        action: OptionsAction,
    },
}

/// Options-file subcommands.
#[derive(Debug, Subcommand)]
pub enum OptionsAction {
    /// Parse an options file, report its contents, and verify it
    /// round-trips.
    Validate {
        /// Path to the options file.
        file: PathBuf,

        /// Cross-check referenced identifiers against this log's users.
        #[arg(long)]
        log: Option<PathBuf>,

        /// Emit JSON instead of the validation summary.
        #[arg(long)]
        json: bool,
    },

    /// Re-emit an options file in canonical form on stdout.
    Normalize {
        /// Path to the options file.
        file: PathBuf,
    },
}
