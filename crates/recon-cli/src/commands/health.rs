//! Health command implementation

use std::path::PathBuf;

use colored::Colorize;
use recon_core::{HealthReport, IssueKind};
use recon_fs::{ConfigStore, NormalizedPath};

use super::{Workspace, print_json};
use crate::error::Result;

/// Run the health command
pub async fn run_health(workspace: &Workspace, json: bool, save: Option<PathBuf>) -> Result<()> {
    let service = workspace.service()?;
    let report = service.health().await?;

    if let Some(path) = save {
        ConfigStore::new().save(&NormalizedPath::new(&path), &report)?;
        if !json {
            println!("{} Report saved to {}", "=>".blue().bold(), path.display());
        }
    }

    if json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

fn print_report(report: &HealthReport) {
    println!("{}", "Storage Health".bold());
    println!();
    println!("{}:  {}", "Documents".dimmed(), report.total_documents);
    println!("{}: {}", "Activities".dimmed(), report.total_activities);
    println!(
        "{}: {} documents, {} activities",
        "With files".dimmed(),
        report.documents_with_files,
        report.activities_with_files
    );
    println!();
    println!("  {} object storage", report.object_storage_files.to_string().green());
    println!("  {} legacy (migratable)", report.legacy_files.to_string().yellow());
    println!("  {} missing", report.missing_files.to_string().red());
    println!();

    let score = format!("{}", report.health_score);
    let score = match report.health_score {
        s if s >= 90 => score.green().bold(),
        s if s >= 60 => score.yellow().bold(),
        _ => score.red().bold(),
    };
    println!("{}: {}", "Health score".bold(), score);

    if report.issues.is_empty() {
        println!();
        println!("{} No issues found.", "OK".green().bold());
        return;
    }

    println!();
    println!("{}:", "Issues".bold());
    for diagnostic in &report.issues {
        let tag = match diagnostic.kind {
            IssueKind::LegacyPending => "LEGACY".yellow(),
            IssueKind::Inconsistent => "RELINK".cyan(),
            IssueKind::Missing => "MISSING".red(),
            IssueKind::Malformed => "MALFORMED".red(),
            IssueKind::BackendUnreachable => "UNREACHABLE".magenta(),
        };
        println!(
            "   {} {} {} ({})",
            tag.bold(),
            diagnostic.entity().to_string().cyan(),
            diagnostic.expected_path,
            diagnostic.issue.as_deref().unwrap_or_default().dimmed()
        );
    }

    let fixable = report.fixable().count();
    let unrecoverable = report.unrecoverable().count();
    println!();
    if fixable > 0 {
        println!("Run {} to migrate {} record(s).", "recon migrate --all-legacy".cyan(), fixable);
    }
    if unrecoverable > 0 {
        println!(
            "Run {} to preview clearing {} unrecoverable reference(s).",
            "recon cleanup --dry-run".cyan(),
            unrecoverable
        );
    }
}
