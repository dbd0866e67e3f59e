//! Audit snapshot command implementation

use colored::Colorize;

use super::{Workspace, print_json};
use crate::error::Result;

/// Run the audit command
pub fn run_audit(workspace: &Workspace, days: Option<u32>, json: bool) -> Result<()> {
    let service = workspace.service()?;
    let days = days.unwrap_or(service.config().snapshots.default_days);
    let summary = service.run_audit(days)?;

    if json {
        return print_json(&summary);
    }

    println!("{} Snapshot written", "OK".green().bold());
    println!("{}:  {}", "Period".dimmed(), summary.audit_period);
    println!("{}:   {}", "Files".dimmed(), summary.files_count);
    println!("{}:    {}", "Size".dimmed(), summary.total_size);
    for name in &summary.report_filenames {
        println!("   {} {}", "+".green(), name);
    }
    Ok(())
}
