//! Migrate command implementation

use colored::Colorize;
use recon_core::{BatchOutcome, CancelToken, EntityRef, TaskStatus};

use super::{Workspace, print_json};
use crate::error::Result;

/// Run the migrate command
///
/// Ctrl-C stops tasks that have not started yet; started ones finish.
pub async fn run_migrate(
    workspace: &Workspace,
    ids: &[EntityRef],
    all_legacy: bool,
    json: bool,
) -> Result<()> {
    let service = workspace.service()?;
    let cancel = CancelToken::new();

    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; letting started migrations finish");
                cancel.cancel();
            }
        })
    };

    if !json {
        println!("{} Migrating legacy files...", "=>".blue().bold());
    }
    let outcomes = if all_legacy {
        service.migrate_all_legacy(&cancel).await
    } else {
        service.migrate_with_cancel(ids, &cancel).await
    };
    watcher.abort();
    let outcomes = outcomes?;

    if json {
        return print_json(&outcomes);
    }
    print_outcomes(&outcomes);
    Ok(())
}

fn print_outcomes(outcomes: &[BatchOutcome]) {
    if outcomes.is_empty() {
        println!("{} Nothing to migrate.", "OK".green().bold());
        return;
    }

    let mut succeeded = 0;
    for outcome in outcomes {
        match outcome {
            BatchOutcome::Task(task) if task.status == TaskStatus::Success => {
                succeeded += 1;
                let verb = if task.relinked { "relinked" } else { "migrated" };
                println!(
                    "   {} {} {} -> {}",
                    "+".green(),
                    task.entity.to_string().cyan(),
                    verb,
                    task.target_path.as_deref().unwrap_or_default()
                );
            }
            BatchOutcome::Task(task) => println!(
                "   {} {} {}",
                "x".red(),
                task.entity.to_string().cyan(),
                task.error_message.as_deref().unwrap_or_default()
            ),
            BatchOutcome::Rejected { entity, reason } => {
                println!("   {} {} {}", "-".yellow(), entity.to_string().cyan(), reason.dimmed())
            }
            BatchOutcome::Cancelled { entity } => {
                let entity = entity.to_string();
                println!("   {} {} {}", "-".dimmed(), entity.cyan(), "not started".dimmed())
            }
        }
    }

    println!();
    println!(
        "{} {}/{} succeeded",
        if succeeded == outcomes.len() { "OK".green().bold() } else { "DONE".yellow().bold() },
        succeeded,
        outcomes.len()
    );
}
