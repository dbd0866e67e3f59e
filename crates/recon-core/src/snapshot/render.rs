//! Human-readable rendering of an audit snapshot

use chrono::{DateTime, Utc};

use super::AuditSnapshot;

const WIDE: usize = 80;
const NARROW: usize = 40;

/// Format a byte count as B, KB, MB or GB with at most two decimals.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Render the `.log` artifact.
pub fn render_text(snapshot: &AuditSnapshot) -> String {
    let mut lines = Vec::new();
    let wide = "=".repeat(WIDE);

    lines.push(wide.clone());
    lines.push("STORAGE AUDIT REPORT".to_string());
    lines.push(wide);
    lines.push(format!("Snapshot: {}", snapshot.timestamp_id));
    lines.push(format!("Audit date: {}", format_time(&snapshot.generated_at)));
    lines.push(format!(
        "Period: {} days (since {})",
        snapshot.period_days,
        format_time(&snapshot.cutoff)
    ));
    lines.push(format!("Root: {}", snapshot.root));
    lines.push(String::new());

    lines.push("SUMMARY:".to_string());
    lines.push("-".repeat(NARROW));
    lines.push(format!("Total files: {}", snapshot.totals.files));
    lines.push(format!("Total size: {}", format_size(snapshot.totals.size_bytes)));
    lines.push(String::new());

    lines.push("BY CATEGORY:".to_string());
    lines.push("-".repeat(NARROW));
    for (category, totals) in &snapshot.totals.categories {
        lines.push(format!(
            "{}: {} files ({})",
            category,
            totals.count,
            format_size(totals.size_bytes)
        ));
    }
    lines.push(String::new());

    lines.push("FILE DETAILS:".to_string());
    lines.push("-".repeat(WIDE));
    lines.push(format!("{:<20}{:<12}{:<20}{}", "Modified", "Size", "Category", "File"));
    lines.push("-".repeat(WIDE));
    for entry in &snapshot.entries {
        lines.push(format!(
            "{:<20}{:<12}{:<20}{}",
            format_time(&entry.modified_at),
            format_size(entry.size_bytes),
            entry.category.to_string(),
            entry.path
        ));
    }
    lines.push(String::new());

    lines.push("SHA-256 HASHES:".to_string());
    lines.push("-".repeat(WIDE));
    for entry in &snapshot.entries {
        let hash = match (&entry.hash, &entry.hash_error) {
            (Some(hash), _) => hash.clone(),
            (None, Some(error)) => format!("ERROR: {}", error),
            (None, None) => "ERROR: unknown".to_string(),
        };
        lines.push(format!("{}  {}", hash, entry.path));
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
