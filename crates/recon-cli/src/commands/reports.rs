//! Snapshot report listing and retrieval

use std::io::Write;
use std::path::PathBuf;

use colored::Colorize;
use recon_core::snapshot::{ReportKind, format_size};

use super::{Workspace, print_json};
use crate::error::Result;

/// Run `reports list`
pub fn run_reports_list(workspace: &Workspace, json: bool) -> Result<()> {
    let service = workspace.service()?;
    let reports = service.list_reports()?;

    if json {
        return print_json(&reports);
    }
    if reports.is_empty() {
        println!("No snapshots yet. Run {} to create one.", "recon audit".cyan());
        return Ok(());
    }

    for report in &reports {
        let kind = match report.kind {
            ReportKind::Structured => "json",
            ReportKind::HumanReadable => "log ",
        };
        println!(
            "   {} {:>10}  {}",
            kind.dimmed(),
            format_size(report.size_bytes),
            report.name
        );
    }
    Ok(())
}

/// Run `reports get`
pub fn run_reports_get(workspace: &Workspace, name: &str, output: Option<PathBuf>) -> Result<()> {
    let service = workspace.service()?;
    let bytes = service.download_report(name)?;

    match output {
        Some(path) => {
            std::fs::write(&path, &bytes)?;
            println!("{} Wrote {}", "OK".green().bold(), path.display());
        }
        None => std::io::stdout().write_all(&bytes)?,
    }
    Ok(())
}
