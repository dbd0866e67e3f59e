//! Health report types
//!
//! A `HealthReport` is an immutable snapshot of drift between the record
//! store and the two backends. It is the only input cleanup accepts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::layout::PathClassification;
use crate::records::{EntityKind, EntityRef};

pub const ISSUE_MISSING: &str = "file not found at expected backend";
pub const ISSUE_MALFORMED: &str = "unparseable reference";
pub const ISSUE_UNREACHABLE: &str = "backend unreachable";
pub const ISSUE_LEGACY: &str = "using legacy local storage path";

/// What kind of finding a diagnostic records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueKind {
    /// Legacy file present; migration candidate
    LegacyPending,
    /// No bytes at the backend the reference names
    Missing,
    /// Reference string cannot be interpreted
    Malformed,
    /// The existence check itself failed or timed out
    BackendUnreachable,
    /// Legacy reference whose bytes already sit at the canonical target
    Inconsistent,
}

/// One finding about one record's file reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticResult {
    pub entity_type: EntityKind,
    pub entity_id: u64,
    /// The reference as stored on the record
    pub expected_path: String,
    pub exists: bool,
    pub issue: Option<String>,
    /// Whether a migration can resolve the issue
    pub fixable: bool,
    pub kind: IssueKind,
    pub classification: PathClassification,
}

impl DiagnosticResult {
    pub fn entity(&self) -> EntityRef {
        EntityRef::new(self.entity_type, self.entity_id)
    }

    /// Unrecoverable: nothing in any backend, only cleanup can resolve it.
    pub fn is_unrecoverable(&self) -> bool {
        !self.exists && !self.fixable
    }
}

/// Result of one audit run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub generated_at: DateTime<Utc>,
    pub total_documents: usize,
    pub total_activities: usize,
    pub documents_with_files: usize,
    pub activities_with_files: usize,
    pub object_storage_files: usize,
    pub legacy_files: usize,
    pub missing_files: usize,
    pub health_score: i64,
    /// Every diagnostic with a non-null issue
    pub issues: Vec<DiagnosticResult>,
}

impl HealthReport {
    /// Diagnostic for `entity`, if the report has one.
    pub fn find(&self, entity: EntityRef) -> Option<&DiagnosticResult> {
        self.issues.iter().find(|d| d.entity() == entity)
    }

    /// Entries only a cleanup can resolve.
    pub fn unrecoverable(&self) -> impl Iterator<Item = &DiagnosticResult> {
        self.issues.iter().filter(|d| d.is_unrecoverable())
    }

    /// Entries a migration can resolve.
    pub fn fixable(&self) -> impl Iterator<Item = &DiagnosticResult> {
        self.issues.iter().filter(|d| d.fixable)
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|d| d.kind == kind).count()
    }
}

/// Percentage of file-bearing records whose bytes are accounted for.
///
/// `round((object + legacy - missing) / with_files * 100)`, or 100 when no
/// record carries a file. The formula is kept as observed in production and
/// can leave the 0..=100 range.
pub fn health_score(
    object_storage_files: usize,
    legacy_files: usize,
    missing_files: usize,
    records_with_files: usize,
) -> i64 {
    if records_with_files == 0 {
        return 100;
    }
    let accounted = object_storage_files as f64 + legacy_files as f64 - missing_files as f64;
    (accounted / records_with_files as f64 * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(100, 15, 5, 120, 92)]
    #[case(0, 0, 0, 0, 100)]
    #[case(10, 0, 0, 10, 100)]
    #[case(3, 0, 3, 3, 0)]
    #[case(1, 0, 2, 2, -50)]
    fn score_formula(
        #[case] object: usize,
        #[case] legacy: usize,
        #[case] missing: usize,
        #[case] with_files: usize,
        #[case] expected: i64,
    ) {
        assert_eq!(health_score(object, legacy, missing, with_files), expected);
    }

    fn diagnostic(id: u64, exists: bool, fixable: bool, kind: IssueKind) -> DiagnosticResult {
        DiagnosticResult {
            entity_type: EntityKind::Document,
            entity_id: id,
            expected_path: format!("/uploads/{}.pdf", id),
            exists,
            issue: Some("x".into()),
            fixable,
            kind,
            classification: PathClassification::LegacyLocal,
        }
    }

    #[test]
    fn report_filters() {
        let report = HealthReport {
            generated_at: Utc::now(),
            total_documents: 3,
            total_activities: 0,
            documents_with_files: 3,
            activities_with_files: 0,
            object_storage_files: 0,
            legacy_files: 1,
            missing_files: 1,
            health_score: 0,
            issues: vec![
                diagnostic(1, true, true, IssueKind::LegacyPending),
                diagnostic(2, false, false, IssueKind::Missing),
                diagnostic(3, false, false, IssueKind::BackendUnreachable),
            ],
        };

        assert_eq!(report.fixable().count(), 1);
        assert_eq!(report.unrecoverable().count(), 2);
        assert_eq!(report.count(IssueKind::Missing), 1);
        assert!(report.find(EntityRef::document(2)).is_some());
        assert!(report.find(EntityRef::activity(2)).is_none());
    }

    #[test]
    fn report_serializes_camel_case() {
        let json = serde_json::to_value(diagnostic(7, false, false, IssueKind::Missing)).unwrap();
        assert_eq!(json["entityType"], "document");
        assert_eq!(json["entityId"], 7);
        assert_eq!(json["expectedPath"], "/uploads/7.pdf");
        assert_eq!(json["kind"], "missing");
        assert_eq!(json["classification"], "LegacyLocal");
    }
}
