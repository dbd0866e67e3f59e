//! Cleanup command implementation

use std::path::PathBuf;

use colored::Colorize;
use recon_core::{CleanupAction, CleanupStatus, EntityRef, HealthReport};
use recon_fs::{ConfigStore, NormalizedPath};

use super::{Workspace, print_json};
use crate::error::Result;

/// Run the cleanup command
///
/// Without `--report` a fresh audit supplies the report.
pub async fn run_cleanup(
    workspace: &Workspace,
    dry_run: bool,
    report: Option<PathBuf>,
    ids: &[EntityRef],
    json: bool,
) -> Result<()> {
    let service = workspace.service()?;

    let report: HealthReport = match report {
        Some(path) => ConfigStore::new().load(&NormalizedPath::new(&path))?,
        None => service.health().await?,
    };
    let selection = (!ids.is_empty()).then_some(ids);

    let actions = service.cleanup(&report, selection, dry_run).await?;

    if json {
        return print_json(&actions);
    }
    print_actions(&actions, dry_run);
    Ok(())
}

fn print_actions(actions: &[CleanupAction], dry_run: bool) {
    if actions.is_empty() {
        println!("{} No unrecoverable references.", "OK".green().bold());
        return;
    }

    for action in actions {
        let entity = action.entity.to_string();
        match &action.status {
            CleanupStatus::WouldClear => {
                println!("   [dry-run] Would clear {} ({})", entity.cyan(), action.path)
            }
            CleanupStatus::Cleared => {
                println!("   {} {} cleared ({})", "+".green(), entity.cyan(), action.path)
            }
            CleanupStatus::Refused { reason } => {
                println!("   {} {} refused: {}", "-".yellow(), entity.cyan(), reason.dimmed())
            }
            CleanupStatus::Failed { reason } => {
                println!("   {} {} failed: {}", "x".red(), entity.cyan(), reason)
            }
        }
    }

    if dry_run {
        println!();
        println!("Run {} to apply.", "recon cleanup".cyan());
    }
}
