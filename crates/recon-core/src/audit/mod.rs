//! Read-only drift detection
//!
//! The auditor walks every file-bearing record, classifies its reference and
//! asks the implied backend whether the bytes are there. It never mutates
//! the record store or either backend.

mod report;

pub use report::{
    DiagnosticResult, HealthReport, ISSUE_LEGACY, ISSUE_MALFORMED, ISSUE_MISSING,
    ISSUE_UNREACHABLE, IssueKind, health_score,
};

use chrono::Utc;

use crate::Result;
use crate::backend::{find_migrated_copy, with_deadline};
use crate::context::EngineContext;
use crate::layout::PathClassification;
use crate::records::{EntityKind, EntityRef, FileReference};

/// Running totals of one audit.
#[derive(Debug, Default)]
struct Tally {
    total_documents: usize,
    total_activities: usize,
    documents_with_files: usize,
    activities_with_files: usize,
    object_storage_files: usize,
    legacy_files: usize,
    missing_files: usize,
    issues: Vec<DiagnosticResult>,
}

impl Tally {
    fn count_record(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Document => self.total_documents += 1,
            EntityKind::Activity => self.total_activities += 1,
        }
    }

    fn count_file(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Document => self.documents_with_files += 1,
            EntityKind::Activity => self.activities_with_files += 1,
        }
    }

    fn push(&mut self, diagnostic: DiagnosticResult) {
        if matches!(diagnostic.kind, IssueKind::Missing | IssueKind::Malformed) {
            self.missing_files += 1;
        }
        self.issues.push(diagnostic);
    }

    fn into_report(self) -> HealthReport {
        let with_files = self.documents_with_files + self.activities_with_files;
        HealthReport {
            generated_at: Utc::now(),
            total_documents: self.total_documents,
            total_activities: self.total_activities,
            documents_with_files: self.documents_with_files,
            activities_with_files: self.activities_with_files,
            object_storage_files: self.object_storage_files,
            legacy_files: self.legacy_files,
            missing_files: self.missing_files,
            health_score: health_score(
                self.object_storage_files,
                self.legacy_files,
                self.missing_files,
                with_files,
            ),
            issues: self.issues,
        }
    }
}

fn diagnostic(
    entity: EntityRef,
    path: &str,
    classification: PathClassification,
    kind: IssueKind,
    issue: String,
) -> DiagnosticResult {
    let (exists, fixable) = match kind {
        IssueKind::LegacyPending => (true, true),
        IssueKind::Inconsistent => (false, true),
        IssueKind::Missing | IssueKind::Malformed | IssueKind::BackendUnreachable => (false, false),
    };
    DiagnosticResult {
        entity_type: entity.kind,
        entity_id: entity.id,
        expected_path: path.to_string(),
        exists,
        issue: Some(issue),
        fixable,
        kind,
        classification,
    }
}

/// Produces `HealthReport`s.
pub struct HealthAuditor {
    ctx: EngineContext,
}

impl HealthAuditor {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Audit every document and activity.
    ///
    /// Per-record failures become diagnostics; only an unreachable record
    /// store aborts the audit.
    pub async fn audit(&self) -> Result<HealthReport> {
        let mut tally = Tally::default();

        for kind in EntityKind::ALL {
            let records = self.ctx.records.list_file_bearing_records(kind).await?;
            tracing::debug!(%kind, count = records.len(), "Auditing records");

            for record in &records {
                tally.count_record(kind);
                let entity = EntityRef::new(kind, record.id);

                match FileReference::project(kind, record) {
                    Ok(None) => {}
                    Ok(Some(reference)) => {
                        tally.count_file(kind);
                        self.audit_reference(&reference, &mut tally).await;
                    }
                    Err(e) => {
                        tally.count_file(kind);
                        tracing::debug!(%entity, error = %e, "Reference rejected at projection");
                        let raw = record.file_path.as_deref().unwrap_or_default();
                        tally.push(diagnostic(
                            entity,
                            raw,
                            PathClassification::Malformed,
                            IssueKind::Malformed,
                            ISSUE_MALFORMED.to_string(),
                        ));
                    }
                }
            }
        }

        let report = tally.into_report();
        tracing::info!(
            score = report.health_score,
            objects = report.object_storage_files,
            legacy = report.legacy_files,
            missing = report.missing_files,
            issues = report.issues.len(),
            "Audit complete"
        );
        Ok(report)
    }

    async fn audit_reference(&self, reference: &FileReference, tally: &mut Tally) {
        let entity = reference.entity;
        let path = reference.raw_path.as_str();
        let classification = self.ctx.policy.classify(Some(path));

        match classification {
            PathClassification::Empty => {}
            PathClassification::Malformed => {
                tally.push(diagnostic(
                    entity,
                    path,
                    classification,
                    IssueKind::Malformed,
                    ISSUE_MALFORMED.to_string(),
                ));
            }
            PathClassification::ObjectStorageCanonical => {
                tally.object_storage_files += 1;
                let check = self.ctx.objects.exists(path);
                let exists = with_deadline("exists", path, self.ctx.deadline, check).await;
                match exists {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::debug!(%entity, path, "Object missing");
                        tally.push(diagnostic(
                            entity,
                            path,
                            classification,
                            IssueKind::Missing,
                            ISSUE_MISSING.to_string(),
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(%entity, path, error = %e, "Object backend check failed");
                        tally.push(diagnostic(
                            entity,
                            path,
                            classification,
                            IssueKind::BackendUnreachable,
                            ISSUE_UNREACHABLE.to_string(),
                        ));
                    }
                }
            }
            PathClassification::LegacyLocal => {
                let check = self.ctx.local.exists(path);
                let exists = with_deadline("exists", path, self.ctx.deadline, check).await;
                match exists {
                    Ok(true) => {
                        tally.legacy_files += 1;
                        tally.push(diagnostic(
                            entity,
                            path,
                            classification,
                            IssueKind::LegacyPending,
                            ISSUE_LEGACY.to_string(),
                        ));
                    }
                    Ok(false) => self.locate_migrated_copy(reference, classification, tally).await,
                    Err(e) => {
                        tracing::warn!(%entity, path, error = %e, "Local backend check failed");
                        tally.push(diagnostic(
                            entity,
                            path,
                            classification,
                            IssueKind::BackendUnreachable,
                            ISSUE_UNREACHABLE.to_string(),
                        ));
                    }
                }
            }
        }
    }

    /// A legacy file is gone; check whether a migration of this record
    /// already put its bytes in object storage without repointing it.
    async fn locate_migrated_copy(
        &self,
        reference: &FileReference,
        classification: PathClassification,
        tally: &mut Tally,
    ) {
        let entity = reference.entity;
        let path = reference.raw_path.as_str();
        let candidates = self.ctx.policy.migrated_locations(
            entity,
            reference.reference_date,
            &reference.file_name,
            self.ctx.today(),
        );

        let found =
            find_migrated_copy(self.ctx.objects.as_ref(), candidates, entity, self.ctx.deadline)
                .await;
        let (kind, issue) = match found {
            Ok(Some(target)) => (
                IssueKind::Inconsistent,
                format!("reference inconsistency: bytes found at {}", target),
            ),
            Ok(None) => (IssueKind::Missing, ISSUE_MISSING.to_string()),
            Err(e) => {
                tracing::warn!(%entity, error = %e, "Migrated copy lookup failed");
                (IssueKind::BackendUnreachable, ISSUE_UNREACHABLE.to_string())
            }
        };
        tracing::debug!(%entity, path, ?kind, "Legacy file missing");
        tally.push(diagnostic(entity, path, classification, kind, issue));
    }
}
