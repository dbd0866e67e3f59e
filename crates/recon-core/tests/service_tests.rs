//! Tests for the ReconService facade

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use recon_core::{BatchOutcome, CancelToken, Error, FileRecord, ReconService};
use recon_test_utils::TestWorkspace;

#[tokio::test]
async fn from_config_runs_health_over_default_adapters() {
    let ws = TestWorkspace::new();
    let legacy = ws.legacy_file("documents/a.pdf", b"a");
    ws.add_document(FileRecord::new(1).with_file(&legacy));

    let service = ReconService::from_config(ws.config().clone()).unwrap();
    let report = service.health().await.unwrap();

    assert_eq!(report.legacy_files, 1);
    assert_eq!(report.documents_with_files, 1);
}

#[tokio::test]
async fn migrate_all_legacy_converges_to_full_health() {
    let ws = TestWorkspace::new();
    let date = NaiveDate::from_ymd_opt(2024, 12, 3).unwrap();
    for id in 1..=6 {
        let legacy = ws.legacy_file(&format!("documents/{id}.pdf"), format!("doc {id}").as_bytes());
        ws.add_document(FileRecord::new(id).with_file(&legacy).with_date(date));
    }
    let legacy = ws.legacy_file("activities/ata.pdf", b"ata");
    ws.add_activity(FileRecord::new(1).with_file(&legacy).with_date(date));

    let service = ws.service();
    let outcomes = service.migrate_all_legacy(&CancelToken::new()).await.unwrap();

    assert_eq!(outcomes.len(), 7);
    assert!(outcomes.iter().all(|o| o.is_success()), "{outcomes:?}");

    let report = service.health().await.unwrap();
    assert_eq!(report.object_storage_files, 7);
    assert_eq!(report.legacy_files, 0);
    assert_eq!(report.health_score, 100);
    assert!(report.issues.is_empty());
}

#[tokio::test]
async fn live_cleanup_requires_a_recent_backup_when_configured() {
    let mut ws = TestWorkspace::new();
    ws.add_document(FileRecord::new(1).with_file("/uploads/documents/gone.pdf"));
    ws.config_mut().backups.require_recent_for_cleanup_hours = Some(24);

    let service = ws.service();
    let report = service.health().await.unwrap();

    let dry = service.cleanup(&report, None, true).await.unwrap();
    assert_eq!(dry.len(), 1);

    let err = service.cleanup(&report, None, false).await.unwrap_err();
    assert!(matches!(err, Error::CleanupNotAllowed { .. }), "got: {err:?}");

    let backups = &ws.config().backups.dir;
    std::fs::create_dir_all(backups).unwrap();
    std::fs::write(backups.join("nightly.tar.gz"), b"archive").unwrap();

    let actions = service.cleanup(&report, None, false).await.unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(service.backups().unwrap().len(), 1);
}

#[tokio::test]
async fn run_audit_summarises_the_snapshot() {
    let ws = TestWorkspace::new();
    ws.legacy_file("documents/a.pdf", &[0u8; 1536]);

    let service = ws.service();
    let summary = service.run_audit(6).unwrap();

    assert_eq!(summary.files_count, 1);
    assert_eq!(summary.total_size, "1.5 KB");
    assert_eq!(summary.audit_period, "6 days");
    assert_eq!(summary.report_filenames.len(), 2);

    let listed: Vec<String> = service.list_reports().unwrap().into_iter().map(|r| r.name).collect();
    for name in &summary.report_filenames {
        assert!(listed.contains(name));
        assert!(!service.download_report(name).unwrap().is_empty());
    }

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["filesCount"], 1);
    assert_eq!(json["auditPeriod"], "6 days");
}

#[tokio::test]
async fn migrate_reports_one_outcome_per_entity() {
    let ws = TestWorkspace::new();
    let legacy = ws.legacy_file("documents/a.pdf", b"a");
    let entity = ws.add_document(FileRecord::new(1).with_file(&legacy));

    let outcomes = ws.service().migrate(&[entity, entity]).await.unwrap();

    assert_eq!(outcomes.len(), 2);
    let successes = outcomes.iter().filter(|o| o.is_success()).count();
    assert_eq!(successes, 1);
    assert!(outcomes.iter().any(|o| matches!(o, BatchOutcome::Rejected { .. })));
}
