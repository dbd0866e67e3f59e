//! Filesystem audit snapshots of the legacy storage tree
//!
//! Each run walks the legacy root, records every file modified within the
//! requested period and writes two artifacts sharing one timestamp id: a
//! structured `.json` and a human-readable `.log`. Artifacts are never
//! edited or deleted once written.

mod render;

pub use render::{format_size, render_text};

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use recon_fs::checksum::compute_file_checksum;
use recon_fs::{ConfigStore, NormalizedPath, io};
use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::{Error, Result};

/// Shortest accepted audit period, in days.
pub const MIN_PERIOD_DAYS: u32 = 1;
/// Longest accepted audit period, in days.
pub const MAX_PERIOD_DAYS: u32 = 365;

const ARTIFACT_PREFIX: &str = "storage-audit-";
const ARTIFACT_PATTERN: &str =
    r"^storage-audit-\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2}(-\d+)?\.(json|log)$";

/// Category of a stored file, inferred from its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Activity,
    Document,
    Event,
    Avatar,
    News,
    General,
}

impl Category {
    /// First matching directory segment wins, in declaration order.
    pub fn infer(relative_path: &str) -> Self {
        let segments: Vec<&str> = relative_path.split('/').collect();
        let has = |name: &str| segments[..segments.len().saturating_sub(1)].contains(&name);
        if has("activities") {
            Self::Activity
        } else if has("documents") {
            Self::Document
        } else if has("events") {
            Self::Event
        } else if has("avatars") {
            Self::Avatar
        } else if has("news") {
            Self::News
        } else {
            Self::General
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Activity => "activity",
            Self::Document => "document",
            Self::Event => "event",
            Self::Avatar => "avatar",
            Self::News => "news",
            Self::General => "general",
        };
        f.write_str(label)
    }
}

/// One file in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    /// Path relative to the legacy root, forward slashes
    pub path: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_error: Option<String>,
    pub category: Category,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotals {
    pub count: usize,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTotals {
    pub files: usize,
    pub size_bytes: u64,
    pub categories: BTreeMap<Category, CategoryTotals>,
}

impl SnapshotTotals {
    fn of(entries: &[SnapshotEntry]) -> Self {
        let mut totals = Self::default();
        for entry in entries {
            totals.files += 1;
            totals.size_bytes += entry.size_bytes;
            let category = totals.categories.entry(entry.category).or_default();
            category.count += 1;
            category.size_bytes += entry.size_bytes;
        }
        totals
    }
}

/// A written audit snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSnapshot {
    /// `yyyy-mm-ddThh-mm-ss`, with `-N` appended on a same-second rerun
    pub timestamp_id: String,
    pub generated_at: DateTime<Utc>,
    pub period_days: u32,
    pub cutoff: DateTime<Utc>,
    pub root: String,
    /// Newest first
    pub entries: Vec<SnapshotEntry>,
    pub totals: SnapshotTotals,
}

impl AuditSnapshot {
    pub fn structured_name(&self) -> String {
        artifact_name(&self.timestamp_id, "json")
    }

    pub fn human_readable_name(&self) -> String {
        artifact_name(&self.timestamp_id, "log")
    }

    pub fn report_filenames(&self) -> Vec<String> {
        vec![self.human_readable_name(), self.structured_name()]
    }
}

fn artifact_name(timestamp_id: &str, extension: &str) -> String {
    format!("{}{}.{}", ARTIFACT_PREFIX, timestamp_id, extension)
}

/// Which half of a snapshot an artifact is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportKind {
    Structured,
    HumanReadable,
}

/// A previously written artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFile {
    pub name: String,
    pub kind: ReportKind,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

fn artifact_pattern() -> Result<Regex> {
    Regex::new(ARTIFACT_PATTERN).map_err(|e| Error::Config {
        message: format!("artifact pattern: {}", e),
    })
}

/// Walks the legacy root and manages snapshot artifacts.
#[derive(Debug)]
pub struct Snapshotter {
    root: NormalizedPath,
    reports_dir: NormalizedPath,
    store: ConfigStore,
}

impl Snapshotter {
    pub fn new(root: NormalizedPath, reports_dir: NormalizedPath) -> Self {
        Self {
            root,
            reports_dir,
            store: ConfigStore::new(),
        }
    }

    pub fn reports_dir(&self) -> &NormalizedPath {
        &self.reports_dir
    }

    /// Snapshot files modified within the last `period_days` and write both
    /// artifacts.
    pub fn snapshot(&self, period_days: u32) -> Result<AuditSnapshot> {
        self.snapshot_at(period_days, Utc::now())
    }

    /// As [`Snapshotter::snapshot`], with an explicit clock.
    pub fn snapshot_at(&self, period_days: u32, now: DateTime<Utc>) -> Result<AuditSnapshot> {
        if !(MIN_PERIOD_DAYS..=MAX_PERIOD_DAYS).contains(&period_days) {
            return Err(Error::Config {
                message: format!(
                    "audit period must be between {} and {} days, got {}",
                    MIN_PERIOD_DAYS, MAX_PERIOD_DAYS, period_days
                ),
            });
        }
        if !self.root.is_dir() {
            return Err(Error::SnapshotDirectory {
                path: self.root.to_native(),
                message: "legacy storage root is not a directory".into(),
            });
        }

        let cutoff = now - Duration::days(i64::from(period_days));
        let mut entries = self.collect(cutoff)?;
        entries.sort_by(|a, b| b.modified_at.cmp(&a.modified_at).then_with(|| a.path.cmp(&b.path)));

        let mut snapshot = AuditSnapshot {
            timestamp_id: now.format("%Y-%m-%dT%H-%M-%S").to_string(),
            generated_at: now,
            period_days,
            cutoff,
            root: self.root.to_string(),
            totals: SnapshotTotals::of(&entries),
            entries,
        };
        self.write_artifacts(&mut snapshot)?;

        tracing::info!(
            id = %snapshot.timestamp_id,
            files = snapshot.totals.files,
            bytes = snapshot.totals.size_bytes,
            "Audit snapshot written"
        );
        Ok(snapshot)
    }

    fn collect(&self, cutoff: DateTime<Utc>) -> Result<Vec<SnapshotEntry>> {
        let root = self.root.to_native();
        let reports_dir = self.reports_dir.clone();
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !NormalizedPath::new(e.path()).is_within(&reports_dir));

        let mut entries = Vec::new();
        for item in walker {
            let item = match item {
                Ok(item) => item,
                Err(e) if e.depth() == 0 => {
                    return Err(Error::SnapshotDirectory {
                        path: root.clone(),
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !item.file_type().is_file() {
                continue;
            }

            let metadata = match item.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    let path = item.path().display();
                    tracing::warn!(%path, error = %e, "Skipping entry without metadata");
                    continue;
                }
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let modified_at = DateTime::<Utc>::from(modified);
            if modified_at < cutoff {
                continue;
            }
            let created_at = metadata
                .created()
                .map(DateTime::<Utc>::from)
                .unwrap_or(modified_at);

            let path = NormalizedPath::new(item.path())
                .strip_root(&self.root)
                .unwrap_or_else(|| item.file_name().to_string_lossy().into_owned());
            let (hash, hash_error) = match compute_file_checksum(item.path()) {
                Ok(hash) => (Some(hash), None),
                Err(e) => (None, Some(e.to_string())),
            };

            entries.push(SnapshotEntry {
                category: Category::infer(&path),
                path,
                size_bytes: metadata.len(),
                created_at,
                modified_at,
                hash,
                hash_error,
            });
        }
        Ok(entries)
    }

    /// Write both artifacts under a fresh id; never replaces existing ones.
    fn write_artifacts(&self, snapshot: &mut AuditSnapshot) -> Result<()> {
        std::fs::create_dir_all(self.reports_dir.to_native()).map_err(|e| Error::SnapshotDirectory {
            path: self.reports_dir.to_native(),
            message: e.to_string(),
        })?;

        let base = snapshot.timestamp_id.clone();
        for attempt in 1u32.. {
            if attempt > 1 {
                snapshot.timestamp_id = format!("{}-{}", base, attempt);
            }
            let json_path = self.reports_dir.join(&snapshot.structured_name());
            let log_path = self.reports_dir.join(&snapshot.human_readable_name());
            if json_path.exists() || log_path.exists() {
                continue;
            }

            match self.write_pair(&json_path, &log_path, snapshot) {
                Ok(()) => return Ok(()),
                Err(recon_fs::Error::AlreadyExists { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::SnapshotDirectory {
            path: self.reports_dir.to_native(),
            message: "no free artifact name".into(),
        })
    }

    /// Write the structured artifact, then the human-readable one. When the
    /// second write fails the first is removed again, so a run leaves both
    /// artifacts or neither.
    fn write_pair(
        &self,
        json_path: &NormalizedPath,
        log_path: &NormalizedPath,
        snapshot: &AuditSnapshot,
    ) -> recon_fs::Result<()> {
        self.store.save_new(json_path, snapshot)?;
        let text = render_text(snapshot);
        if let Err(e) = io::write_new(log_path, text.as_bytes(), self.store.robustness()) {
            if let Err(undo) = std::fs::remove_file(json_path.to_native()) {
                tracing::warn!(path = %json_path, error = %undo, "Partial artifact left behind");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Every artifact in the reports directory, newest first.
    pub fn list_reports(&self) -> Result<Vec<ReportFile>> {
        let pattern = artifact_pattern()?;
        let dir = self.reports_dir.to_native();
        let read_dir = match std::fs::read_dir(&dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::SnapshotDirectory {
                    path: dir,
                    message: e.to_string(),
                });
            }
        };

        let mut reports = Vec::new();
        for entry in read_dir.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !pattern.is_match(&name) {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            reports.push(ReportFile {
                kind: if name.ends_with(".json") {
                    ReportKind::Structured
                } else {
                    ReportKind::HumanReadable
                },
                size_bytes: metadata.len(),
                modified_at: metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now()),
                name,
            });
        }

        reports.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(reports)
    }

    fn report_path(&self, name: &str) -> Result<NormalizedPath> {
        if !artifact_pattern()?.is_match(name) {
            return Err(Error::InvalidReportName(name.to_string()));
        }
        Ok(self.reports_dir.join(name))
    }

    /// Raw bytes of one artifact.
    pub fn download_report(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.report_path(name)?;
        io::read_bytes(&path).map_err(|e| {
            if e.is_not_found() {
                Error::NotFound(name.to_string())
            } else {
                e.into()
            }
        })
    }

    /// Parse a structured artifact back into a snapshot.
    pub fn load_snapshot(&self, name: &str) -> Result<AuditSnapshot> {
        if !name.ends_with(".json") {
            return Err(Error::InvalidReportName(name.to_string()));
        }
        let path = self.report_path(name)?;
        if !path.exists() {
            return Err(Error::NotFound(name.to_string()));
        }
        Ok(self.store.load(&path)?)
    }
}
