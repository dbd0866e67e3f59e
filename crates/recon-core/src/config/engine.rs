//! Typed engine configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::DEFAULT_BACKEND_TIMEOUT;
use crate::layout::LayoutPolicy;
use crate::migrate::DEFAULT_CONCURRENCY;
use crate::snapshot::{MAX_PERIOD_DAYS, MIN_PERIOD_DAYS};
use crate::{Error, Result};

/// Where the two backends live and how references name them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub legacy_root: PathBuf,
    pub object_root: PathBuf,
    pub layout: LayoutPolicy,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            legacy_root: PathBuf::from("storage/legacy"),
            object_root: PathBuf::from("storage/objects"),
            layout: LayoutPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordsSection {
    /// The records ledger (`.toml`)
    pub path: PathBuf,
}

impl Default for RecordsSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".recon/records.toml"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSection {
    /// Migrations run at once in a batch
    pub concurrency: usize,
    /// Deadline for a single backend call
    pub backend_timeout_ms: u64,
}

impl Default for MigrationSection {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            backend_timeout_ms: DEFAULT_BACKEND_TIMEOUT.as_millis() as u64,
        }
    }
}

impl MigrationSection {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotsSection {
    pub reports_dir: PathBuf,
    pub default_days: u32,
}

impl Default for SnapshotsSection {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from(".recon/reports"),
            default_days: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupsSection {
    pub dir: PathBuf,
    /// A live cleanup needs a backup at most this many hours old
    pub require_recent_for_cleanup_hours: Option<u64>,
}

impl Default for BackupsSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("backups"),
            require_recent_for_cleanup_hours: None,
        }
    }
}

/// Effective configuration of one workspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub storage: StorageSection,
    pub records: RecordsSection,
    pub migration: MigrationSection,
    pub snapshots: SnapshotsSection,
    pub backups: BackupsSection,
}

impl EngineConfig {
    /// Make every relative path absolute against `root`.
    pub fn anchored(mut self, root: &Path) -> Self {
        for path in [
            &mut self.storage.legacy_root,
            &mut self.storage.object_root,
            &mut self.records.path,
            &mut self.snapshots.reports_dir,
            &mut self.backups.dir,
        ] {
            if path.as_os_str().is_empty() {
                *path = root.to_path_buf();
            } else if path.is_relative() {
                *path = root.join(&*path);
            }
        }
        self
    }

    /// Layout policy that also recognises absolute references under the
    /// legacy root, once anchored.
    pub fn layout_policy(&self) -> LayoutPolicy {
        let layout = self.storage.layout.clone();
        if !self.storage.legacy_root.is_absolute() {
            return layout;
        }
        let root = recon_fs::NormalizedPath::new(&self.storage.legacy_root);
        layout.with_legacy_root(root.as_str())
    }

    /// Reject values no operation could run with.
    pub fn validate(&self) -> Result<()> {
        if self.migration.concurrency == 0 {
            return Err(Error::Config {
                message: "migration.concurrency must be at least 1".into(),
            });
        }
        if self.migration.backend_timeout_ms == 0 {
            return Err(Error::Config {
                message: "migration.backend_timeout_ms must be at least 1".into(),
            });
        }
        if !(MIN_PERIOD_DAYS..=MAX_PERIOD_DAYS).contains(&self.snapshots.default_days) {
            return Err(Error::Config {
                message: format!(
                    "snapshots.default_days must be between {} and {}",
                    MIN_PERIOD_DAYS, MAX_PERIOD_DAYS
                ),
            });
        }
        if self.storage.layout.object_prefix.is_empty() {
            return Err(Error::Config {
                message: "storage.layout.object_prefix must not be empty".into(),
            });
        }
        let object_prefix = &self.storage.layout.object_prefix;
        if let Some(overlap) = self
            .storage
            .layout
            .legacy_prefixes
            .iter()
            .find(|p| {
                p.is_empty()
                    || p.starts_with(object_prefix.as_str())
                    || object_prefix.starts_with(p.as_str())
            })
        {
            return Err(Error::Config {
                message: format!("legacy prefix {:?} overlaps the object prefix", overlap),
            });
        }
        Ok(())
    }
}
