//! Cleanup of unrecoverable references
//!
//! Dry-run and live mode share one code path; `dry_run` only decides
//! whether the final write happens.

use serde::Serialize;

use super::{ClaimPurpose, MigrationEngine};
use crate::audit::{DiagnosticResult, HealthReport, IssueKind};
use crate::records::EntityRef;
use crate::{Error, Result};

/// What cleanup did, or would do, for one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum CleanupStatus {
    /// Dry run: the reference would be cleared
    WouldClear,
    /// The reference was cleared
    Cleared,
    /// The entry is not eligible
    Refused { reason: String },
    /// Clearing was attempted and failed
    Failed { reason: String },
}

/// One cleanup decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupAction {
    #[serde(flatten)]
    pub entity: EntityRef,
    /// The reference the report flagged
    pub path: String,
    #[serde(flatten)]
    pub status: CleanupStatus,
}

impl CleanupAction {
    fn new(entity: EntityRef, path: &str, status: CleanupStatus) -> Self {
        Self {
            entity,
            path: path.to_string(),
            status,
        }
    }

    fn refused(entity: EntityRef, path: &str, error: Error) -> Self {
        Self::new(
            entity,
            path,
            CleanupStatus::Refused {
                reason: error.to_string(),
            },
        )
    }

    pub fn is_refused(&self) -> bool {
        matches!(self.status, CleanupStatus::Refused { .. })
    }
}

fn not_allowed(entity: EntityRef, reason: &str) -> Error {
    Error::CleanupNotAllowed {
        entity: entity.to_string(),
        reason: reason.to_string(),
    }
}

impl MigrationEngine {
    /// Clear references the report proves unrecoverable.
    ///
    /// Only entries with `exists == false && fixable == false` are
    /// eligible. With `selection`, exactly those entities are considered
    /// and any that the report lacks or marks fixable are refused. In live
    /// mode each record is re-read first and refused if its reference
    /// changed since the report. Only a record store outage aborts.
    pub async fn cleanup(
        &self,
        report: &HealthReport,
        selection: Option<&[EntityRef]>,
        dry_run: bool,
    ) -> Result<Vec<CleanupAction>> {
        let mut actions = Vec::new();

        let candidates: Vec<&DiagnosticResult> = match selection {
            None => report.unrecoverable().collect(),
            Some(entities) => {
                let mut chosen = Vec::new();
                for &entity in entities {
                    match report.find(entity) {
                        None => actions.push(CleanupAction::refused(
                            entity,
                            "",
                            not_allowed(entity, "not present in the supplied report"),
                        )),
                        Some(d) if d.fixable => actions.push(CleanupAction::refused(
                            entity,
                            &d.expected_path,
                            not_allowed(entity, "fixable; migrate it instead"),
                        )),
                        Some(d) if d.exists => actions.push(CleanupAction::refused(
                            entity,
                            &d.expected_path,
                            not_allowed(entity, "file exists"),
                        )),
                        Some(d) => chosen.push(d),
                    }
                }
                chosen
            }
        };

        for diagnostic in candidates {
            let action = self.cleanup_one(diagnostic, dry_run).await?;
            actions.push(action);
        }

        let cleared = actions
            .iter()
            .filter(|a| matches!(a.status, CleanupStatus::Cleared | CleanupStatus::WouldClear))
            .count();
        tracing::info!(dry_run, total = actions.len(), cleared, "Cleanup finished");
        Ok(actions)
    }

    async fn cleanup_one(
        &self,
        diagnostic: &DiagnosticResult,
        dry_run: bool,
    ) -> Result<CleanupAction> {
        let entity = diagnostic.entity();
        let path = diagnostic.expected_path.as_str();

        if diagnostic.kind == IssueKind::BackendUnreachable {
            return Ok(CleanupAction::refused(
                entity,
                path,
                not_allowed(entity, "backend was unreachable; re-run the audit"),
            ));
        }

        let _guard = match self.registry.claim(entity, ClaimPurpose::Cleanup) {
            Ok(guard) => guard,
            Err(e) => return Ok(CleanupAction::refused(entity, path, e)),
        };

        let current = match self.ctx.records.fetch_record(entity).await {
            Ok(record) => record,
            Err(e) if e.is_structural() => return Err(e),
            Err(e) => {
                return Ok(CleanupAction::new(
                    entity,
                    path,
                    CleanupStatus::Failed { reason: e.to_string() },
                ));
            }
        };
        let Some(current) = current else {
            let reason = not_allowed(entity, "record no longer exists");
            return Ok(CleanupAction::refused(entity, path, reason));
        };
        if current.file_path.as_deref().unwrap_or_default() != path {
            return Ok(CleanupAction::refused(
                entity,
                path,
                not_allowed(entity, "stale: reference changed since the report"),
            ));
        }

        if dry_run {
            tracing::debug!(%entity, path, "[dry-run] Would clear reference");
            return Ok(CleanupAction::new(entity, path, CleanupStatus::WouldClear));
        }

        match self
            .ctx
            .records
            .update_file_reference(entity.kind, entity.id, None)
            .await
        {
            Ok(()) => {
                tracing::info!(%entity, path, "Cleared unrecoverable reference");
                Ok(CleanupAction::new(entity, path, CleanupStatus::Cleared))
            }
            Err(e) if e.is_structural() => Err(e),
            Err(e) => {
                tracing::warn!(%entity, error = %e, "Failed to clear reference");
                Ok(CleanupAction::new(
                    entity,
                    path,
                    CleanupStatus::Failed { reason: e.to_string() },
                ))
            }
        }
    }
}
