//! Storage reconciler CLI
//!
//! Operator-facing entry point to the health audit, migration, cleanup and
//! snapshot operations of `recon-core`.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ReportsAction};
use commands::Workspace;
use error::Result;

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "RECON_LOG";

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A second init (tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::debug!("Verbose mode enabled");

    let Some(command) = cli.command else {
        println!("{} Storage reconciler", "recon".green().bold());
        println!();
        println!("Run {} for available commands.", "recon --help".cyan());
        return Ok(());
    };

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let workspace = Workspace::new(root, cli.config);
    execute_command(&workspace, command)
}

fn execute_command(workspace: &Workspace, command: Commands) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    match command {
        Commands::Health { json, save } => {
            runtime.block_on(commands::run_health(workspace, json, save))
        }
        Commands::Migrate { ids, all_legacy, json } => {
            runtime.block_on(commands::run_migrate(workspace, &ids, all_legacy, json))
        }
        Commands::Cleanup {
            dry_run,
            report,
            ids,
            json,
        } => runtime.block_on(commands::run_cleanup(workspace, dry_run, report, &ids, json)),
        Commands::Audit { days, json } => commands::run_audit(workspace, days, json),
        Commands::Reports { action } => match action {
            ReportsAction::List { json } => commands::run_reports_list(workspace, json),
            ReportsAction::Get { name, output } => {
                commands::run_reports_get(workspace, &name, output)
            }
        },
        Commands::Backups { json } => commands::run_backups(workspace, json),
    }
}
