//! Backup archive enumeration

use std::fs;

use chrono::{DateTime, Utc};
use recon_fs::NormalizedPath;
use serde::Serialize;

use crate::{Error, Result};

/// File name suffixes recognised as backup archives.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".tar.gz", ".tgz", ".tar", ".zip", ".gz", ".sql"];

/// One archive in the backups directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub name: String,
    pub size_bytes: u64,
    /// Birth time where the platform records it, else modification time
    pub created_at: DateTime<Utc>,
}

impl BackupEntry {
    /// Age relative to `now`; zero for archives dated in the future.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.created_at).max(chrono::Duration::zero())
    }
}

/// Lists backup archives under one directory
#[derive(Debug, Clone)]
pub struct BackupCatalog {
    dir: NormalizedPath,
}

impl BackupCatalog {
    pub fn new(dir: NormalizedPath) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &NormalizedPath {
        &self.dir
    }

    fn is_archive(name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        ARCHIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
    }

    /// Every archive, newest first. A missing directory holds no backups.
    pub fn list(&self) -> Result<Vec<BackupEntry>> {
        let dir = self.dir.to_native();
        let read_dir = match fs::read_dir(&dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %self.dir, "No backups directory");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(Error::SnapshotDirectory {
                    path: dir,
                    message: e.to_string(),
                });
            }
        };

        let mut entries = Vec::new();
        for entry in read_dir.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !Self::is_archive(&name) {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let created = metadata.created().or_else(|_| metadata.modified());
            let Ok(created) = created else {
                continue;
            };
            entries.push(BackupEntry {
                name,
                size_bytes: metadata.len(),
                created_at: DateTime::<Utc>::from(created),
            });
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }

    /// The newest archive, if any.
    pub fn latest(&self) -> Result<Option<BackupEntry>> {
        Ok(self.list()?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("full-2026-10-01.tar.gz", true)]
    #[case("full.TGZ", true)]
    #[case("db.sql", true)]
    #[case("site.zip", true)]
    #[case("notes.txt", false)]
    #[case("archive.tar.gz.partial", false)]
    fn recognises_archives(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(BackupCatalog::is_archive(name), expected);
    }

    #[test]
    fn lists_only_archives() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.zip"), b"zip").unwrap();
        std::fs::write(temp.path().join("b.sql"), b"select 1;").unwrap();
        std::fs::write(temp.path().join("readme.md"), b"#").unwrap();
        std::fs::create_dir(temp.path().join("dir.zip")).unwrap();

        let catalog = BackupCatalog::new(NormalizedPath::new(temp.path()));
        let mut names: Vec<String> = catalog.list().unwrap().into_iter().map(|e| e.name).collect();
        names.sort();

        assert_eq!(names, vec!["a.zip".to_string(), "b.sql".to_string()]);
        assert!(catalog.latest().unwrap().is_some());
    }

    #[test]
    fn missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let catalog = BackupCatalog::new(NormalizedPath::new(temp.path().join("absent")));

        assert!(catalog.list().unwrap().is_empty());
        assert!(catalog.latest().unwrap().is_none());
    }

    #[test]
    fn future_archives_have_zero_age() {
        let now = Utc::now();
        let entry = BackupEntry {
            name: "x.zip".into(),
            size_bytes: 1,
            created_at: now + chrono::Duration::hours(1),
        };
        assert_eq!(entry.age(now), chrono::Duration::zero());
    }
}
