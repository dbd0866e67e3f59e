//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use recon_core::EntityRef;

/// Storage reconciler - audit and migrate file references between legacy
/// local storage and object storage
#[derive(Parser, Debug)]
#[command(name = "recon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging (otherwise controlled by RECON_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Workspace root holding `.recon/` and the storage trees
    #[arg(long, global = true, env = "RECON_ROOT")]
    pub root: Option<PathBuf>,

    /// Extra configuration file applied over every other layer
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Audit every record against both backends
    Health {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,

        /// Also write the report to FILE (.json or .toml); cleanup can
        /// consume it later
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },

    /// Migrate legacy files into object storage
    ///
    /// Examples:
    ///   recon migrate document:42 activity:7
    ///   recon migrate --all-legacy
    Migrate {
        /// Records to migrate (`document:42`, `activity:7`, or a bare document id)
        #[arg(required_unless_present = "all_legacy")]
        ids: Vec<EntityRef>,

        /// Audit first, then migrate every fixable record
        #[arg(long, conflicts_with = "ids")]
        all_legacy: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Clear references whose files exist in no backend
    Cleanup {
        /// Report what would be cleared without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Use a report saved by `recon health --save` instead of auditing now
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// Only consider these records
        ids: Vec<EntityRef>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Write a timestamped snapshot of recently modified legacy files
    Audit {
        /// Period in days (1-365); defaults to `snapshots.default_days`
        #[arg(long)]
        days: Option<u32>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List or fetch previously written snapshots
    Reports {
        #[command(subcommand)]
        action: ReportsAction,
    },

    /// List full-system backup archives
    Backups {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

/// Snapshot artifact actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ReportsAction {
    /// List artifacts, newest first
    List {
        #[arg(long)]
        json: bool,
    },

    /// Print one artifact, or write it to a file
    Get {
        /// Artifact file name, e.g. storage-audit-2026-10-17T09-30-00.json
        name: String,

        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}
