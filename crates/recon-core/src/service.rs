//! Service facade over the whole engine
//!
//! `ReconService` wires a resolved [`EngineConfig`] to concrete adapters and
//! exposes the operations an application layer calls: health, migrate,
//! cleanup, audit snapshots and the backup listing.

use std::sync::Arc;

use chrono::Utc;
use recon_fs::NormalizedPath;
use serde::Serialize;

use crate::audit::{HealthAuditor, HealthReport};
use crate::backend::{LocalBackend, ObjectBackend};
use crate::backup::{BackupCatalog, BackupEntry};
use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::migrate::{BatchOutcome, CancelToken, CleanupAction, MigrationEngine};
use crate::records::{EntityRef, LedgerStore};
use crate::snapshot::{AuditSnapshot, ReportFile, Snapshotter, format_size};
use crate::{Error, Result};

/// Response of a snapshot run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub files_count: usize,
    /// Human-readable total, e.g. `"1.5 MB"`
    pub total_size: String,
    pub total_size_bytes: u64,
    /// e.g. `"6 days"`
    pub audit_period: String,
    pub report_filenames: Vec<String>,
}

impl From<&AuditSnapshot> for AuditSummary {
    fn from(snapshot: &AuditSnapshot) -> Self {
        Self {
            files_count: snapshot.totals.files,
            total_size: format_size(snapshot.totals.size_bytes),
            total_size_bytes: snapshot.totals.size_bytes,
            audit_period: format!("{} days", snapshot.period_days),
            report_filenames: snapshot.report_filenames(),
        }
    }
}

/// Entry point for every operation on one workspace
pub struct ReconService {
    engine: MigrationEngine,
    snapshotter: Snapshotter,
    backups: BackupCatalog,
    config: EngineConfig,
}

impl ReconService {
    /// Build the default adapters (ledger file, local directory, object
    /// directory) from an anchored configuration.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let policy = config.layout_policy();

        let records = LedgerStore::new(&config.records.path);
        let legacy_root = NormalizedPath::new(&config.storage.legacy_root);
        let object_root = NormalizedPath::new(&config.storage.object_root);
        let local = LocalBackend::new(legacy_root, policy.clone());
        let objects = ObjectBackend::new(object_root, policy.clone());

        let ctx = EngineContext::new(Arc::new(records), Arc::new(local), Arc::new(objects))
            .with_policy(policy)
            .with_deadline(config.migration.backend_timeout());

        tracing::debug!(?ctx, "Service initialised");
        Ok(Self::from_parts(ctx, config))
    }

    /// Build around an existing context; paths for snapshots and backups
    /// still come from `config`.
    pub fn from_parts(ctx: EngineContext, config: EngineConfig) -> Self {
        let engine = MigrationEngine::new(ctx).with_concurrency(config.migration.concurrency);
        let snapshotter = Snapshotter::new(
            NormalizedPath::new(&config.storage.legacy_root),
            NormalizedPath::new(&config.snapshots.reports_dir),
        );
        let backups = BackupCatalog::new(NormalizedPath::new(&config.backups.dir));
        Self {
            engine,
            snapshotter,
            backups,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn engine(&self) -> &MigrationEngine {
        &self.engine
    }

    pub fn snapshotter(&self) -> &Snapshotter {
        &self.snapshotter
    }

    pub async fn health(&self) -> Result<HealthReport> {
        HealthAuditor::new(self.engine.context().clone()).audit().await
    }

    /// Migrate the given records as one batch.
    pub async fn migrate(&self, entities: &[EntityRef]) -> Result<Vec<BatchOutcome>> {
        self.migrate_with_cancel(entities, &CancelToken::new()).await
    }

    pub async fn migrate_with_cancel(
        &self,
        entities: &[EntityRef],
        cancel: &CancelToken,
    ) -> Result<Vec<BatchOutcome>> {
        self.engine.migrate_all(entities, cancel).await
    }

    /// Audit, then migrate every fixable record the audit found.
    pub async fn migrate_all_legacy(&self, cancel: &CancelToken) -> Result<Vec<BatchOutcome>> {
        let report = self.health().await?;
        let entities: Vec<EntityRef> = report.fixable().map(|d| d.entity()).collect();
        tracing::info!(count = entities.len(), "Migrating fixable records");
        self.engine.migrate_all(&entities, cancel).await
    }

    /// Clear unrecoverable references from `report`.
    ///
    /// A live run is refused outright when a recent backup is required and
    /// none is present.
    pub async fn cleanup(
        &self,
        report: &HealthReport,
        selection: Option<&[EntityRef]>,
        dry_run: bool,
    ) -> Result<Vec<CleanupAction>> {
        if !dry_run {
            self.require_recent_backup()?;
        }
        self.engine.cleanup(report, selection, dry_run).await
    }

    fn require_recent_backup(&self) -> Result<()> {
        let Some(hours) = self.config.backups.require_recent_for_cleanup_hours else {
            return Ok(());
        };
        let refuse = |reason: String| Error::CleanupNotAllowed {
            entity: "*".into(),
            reason,
        };
        let latest = self
            .backups
            .latest()?
            .ok_or_else(|| refuse(format!("no backup found in {}", self.backups.dir())))?;

        let age = latest.age(Utc::now());
        if age > chrono::Duration::hours(hours as i64) {
            return Err(refuse(format!(
                "newest backup {} is {}h old, limit is {}h",
                latest.name,
                age.num_hours(),
                hours
            )));
        }
        tracing::debug!(backup = %latest.name, "Recent backup present");
        Ok(())
    }

    /// Write a new snapshot of the legacy tree.
    pub fn run_audit(&self, period_days: u32) -> Result<AuditSummary> {
        let snapshot = self.snapshotter.snapshot(period_days)?;
        Ok(AuditSummary::from(&snapshot))
    }

    pub fn list_reports(&self) -> Result<Vec<ReportFile>> {
        self.snapshotter.list_reports()
    }

    pub fn download_report(&self, name: &str) -> Result<Vec<u8>> {
        self.snapshotter.download_report(name)
    }

    pub fn backups(&self) -> Result<Vec<BackupEntry>> {
        self.backups.list()
    }
}
