//! Backup listing command

use colored::Colorize;
use recon_core::snapshot::format_size;

use super::{Workspace, print_json};
use crate::error::Result;

/// Run the backups command
pub fn run_backups(workspace: &Workspace, json: bool) -> Result<()> {
    let service = workspace.service()?;
    let backups = service.backups()?;

    if json {
        return print_json(&backups);
    }
    if backups.is_empty() {
        let dir = service.config().backups.dir.display();
        println!("{} No backups in {}", "WARN".yellow().bold(), dir);
        return Ok(());
    }

    for backup in &backups {
        println!(
            "   {}  {:>10}  {}",
            backup.created_at.format("%Y-%m-%d %H:%M"),
            format_size(backup.size_bytes),
            backup.name
        );
    }
    Ok(())
}
