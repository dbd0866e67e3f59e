//! End-to-end scenarios across the whole engine
//!
//! Each test drives the public `ReconService` / engine surface against a
//! temporary workspace with the default file-backed adapters.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use recon_core::audit::IssueKind;
use recon_core::{
    CleanupStatus, EntityRef, FileRecord, LayoutPolicy, MigrationEngine, PathClassification,
    TaskStatus,
};
use recon_test_utils::{FaultyBackend, RecordingStore, TestWorkspace};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// =============================================================================
// Scenario A: legacy document migrates and audits as canonical
// =============================================================================

#[tokio::test]
async fn scenario_a_legacy_document_migrates() {
    let ws = TestWorkspace::new();
    let legacy = ws.legacy_file("abc.pdf", b"%PDF-1.4 minutes");
    let entity =
        ws.add_document(FileRecord::new(1).with_file(&legacy).with_date(date(2025, 5, 11)));
    assert_eq!(legacy, "/legacy/uploads/abc.pdf");

    let service = ws.service();
    let outcomes = service.migrate(&[entity]).await.unwrap();
    assert!(outcomes[0].is_success());

    let report = service.health().await.unwrap();
    assert!(report.find(entity).is_none(), "no diagnostic expected: {:?}", report.issues);
    assert_eq!(report.object_storage_files, 1);

    let path = ws.record(entity).file_path.unwrap();
    assert_eq!(ws.policy().classify(Some(&path)), PathClassification::ObjectStorageCanonical);
    assert!(path.contains("/2025/05/"), "got {path}");
    assert!(ws.object_path(&path).is_file());
}

// =============================================================================
// Scenario B: a reference present in neither backend is cleaned up
// =============================================================================

#[tokio::test]
async fn scenario_b_unrecoverable_reference_is_cleared() {
    let ws = TestWorkspace::new();
    let entity = ws.add_document(FileRecord::new(9).with_file("/uploads/documents/nowhere.pdf"));
    let service = ws.service();

    let report = service.health().await.unwrap();
    let diag = report.find(entity).unwrap();
    assert!(!diag.exists);
    assert!(!diag.fixable);
    assert_eq!(report.missing_files, 1);

    let actions = service.cleanup(&report, None, false).await.unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].status, CleanupStatus::Cleared);
    assert_eq!(ws.record(entity).file_path, None);

    let after = service.health().await.unwrap();
    assert_eq!(after.missing_files, 0);
    assert!(after.find(entity).is_none());
    // the record itself survives
    assert_eq!(after.total_documents, 1);
}

// =============================================================================
// Migration safety: interruption between copy and repoint loses nothing
// =============================================================================

#[tokio::test]
async fn interrupted_migration_keeps_legacy_reference_valid() {
    let ws = TestWorkspace::new();
    let legacy = ws.legacy_file("documents/contract.pdf", b"contract");
    let entity = ws.add_document(FileRecord::new(1).with_file(&legacy).with_date(date(2025, 1, 2)));

    // bytes are written but the repoint never happens
    let store = Arc::new(RecordingStore::new(Arc::new(ws.ledger())));
    store.set_fail_updates(true);
    let ctx = ws.context_with(store.clone(), ws.local_backend(), ws.object_backend());
    let result = MigrationEngine::new(ctx).migrate(entity).await;
    assert!(result.is_err());
    assert!(store.updates().is_empty());

    let report = ws.service().health().await.unwrap();
    let diag = report.find(entity).unwrap();
    assert_eq!(diag.expected_path, legacy);
    assert!(diag.exists);
    assert_eq!(diag.kind, IssueKind::LegacyPending);

    // a rerun reuses the identical bytes already at the target
    let objects = Arc::new(FaultyBackend::new(ws.object_backend()));
    let ctx = ws.context_with(Arc::new(ws.ledger()), ws.local_backend(), objects.clone());
    let task = MigrationEngine::new(ctx).migrate(entity).await.unwrap();
    assert_eq!(task.status, TaskStatus::Success);
    assert_eq!(task.target_path.as_deref(), Some("/objects/documents/2025/01/contract.pdf"));
    assert_eq!(objects.writes(), 0);
}

#[tokio::test]
async fn lost_write_keeps_legacy_reference_valid() {
    let ws = TestWorkspace::new();
    let legacy = ws.legacy_file("documents/a.pdf", b"a");
    let entity = ws.add_document(FileRecord::new(1).with_file(&legacy));

    let objects = Arc::new(FaultyBackend::new(ws.object_backend()).drop_writes());
    let ctx = ws.context_with(Arc::new(ws.ledger()), ws.local_backend(), objects);
    let task = MigrationEngine::new(ctx).migrate(entity).await.unwrap();
    assert_eq!(task.status, TaskStatus::Error);

    let report = ws.service().health().await.unwrap();
    assert!(report.find(entity).unwrap().exists);
    assert_eq!(ws.record(entity).file_path.as_deref(), Some(legacy.as_str()));
}

#[tokio::test]
async fn same_named_documents_never_share_bytes() {
    let ws = TestWorkspace::new();
    let may = date(2025, 5, 11);
    let legacy = ws.legacy_file("documents/ata.pdf", b"minutes of session 1");
    let first = ws.add_document(FileRecord::new(1).with_file(&legacy).with_date(may));
    let stray = "/legacy/uploads/documents/2/ata.pdf";
    let second = ws.add_document(FileRecord::new(2).with_file(stray).with_date(may));
    let service = ws.service();

    assert!(service.migrate(&[first]).await.unwrap()[0].is_success());

    let report = service.health().await.unwrap();
    let diag = report.find(second).unwrap();
    assert_eq!(diag.kind, IssueKind::Missing);
    assert!(diag.is_unrecoverable());

    let outcomes = service.migrate(&[second]).await.unwrap();
    assert!(!outcomes[0].is_success());
    assert_eq!(ws.record(second).file_path.as_deref(), Some(stray));

    let actions = service.cleanup(&report, None, false).await.unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].entity, second);
    assert_eq!(ws.record(second).file_path, None);
    assert_eq!(
        ws.record(first).file_path.as_deref(),
        Some("/objects/documents/2025/05/ata.pdf")
    );
}

// =============================================================================
// Idempotence
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn immediate_double_migrate_moves_bytes_once() {
    let ws = TestWorkspace::new();
    let legacy = ws.legacy_file("documents/once.pdf", b"once");
    let entity = ws.add_document(FileRecord::new(1).with_file(&legacy).with_date(date(2025, 3, 3)));

    let store = Arc::new(RecordingStore::new(Arc::new(ws.ledger())));
    let objects = Arc::new(FaultyBackend::new(ws.object_backend()));
    let ctx = ws.context_with(store.clone(), ws.local_backend(), objects.clone());
    let engine = MigrationEngine::new(ctx);

    let (a, b) = tokio::join!(
        {
            let engine = engine.clone();
            tokio::spawn(async move { engine.migrate(entity).await })
        },
        {
            let engine = engine.clone();
            tokio::spawn(async move { engine.migrate(entity).await })
        }
    );
    let results = [a.unwrap(), b.unwrap()];

    let successes = results
        .iter()
        .filter(|r| matches!(r, Ok(t) if t.status == TaskStatus::Success))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    assert_eq!(store.updates().len(), 1);
    assert_eq!(objects.writes(), 1);
}

#[tokio::test]
async fn migrating_again_after_success_is_rejected_across_engines() {
    let ws = TestWorkspace::new();
    let legacy = ws.legacy_file("documents/x.pdf", b"x");
    let entity = ws.add_document(FileRecord::new(1).with_file(&legacy));

    MigrationEngine::new(ws.context()).migrate(entity).await.unwrap();
    let second = MigrationEngine::new(ws.context()).migrate(entity).await;

    assert!(second.is_err());
}

// =============================================================================
// Cleanup safety
// =============================================================================

#[tokio::test]
async fn cleanup_touches_only_unrecoverable_report_entries() {
    let ws = TestWorkspace::new();
    let legacy = ws.legacy_file("documents/live.pdf", b"live");
    let object = ws.object_file("activities/2025/02/ok.pdf", b"ok");
    let live = ws.add_document(FileRecord::new(1).with_file(&legacy));
    let ok = ws.add_activity(FileRecord::new(2).with_file(&object));
    let lost =
        ws.add_activity(FileRecord::new(3).with_file("/objects/activities/2025/02/lost.pdf"));

    let store = Arc::new(RecordingStore::new(Arc::new(ws.ledger())));
    let ctx = ws.context_with(store.clone(), ws.local_backend(), ws.object_backend());
    let service = ws.service_with(ctx);
    let report = service.health().await.unwrap();

    let preview = service.cleanup(&report, None, true).await.unwrap();
    assert_eq!(preview.len(), 1);
    assert!(store.updates().is_empty());

    // a record added after the report is never touched
    let late = ws.add_document(FileRecord::new(4).with_file("/uploads/late.pdf"));

    service.cleanup(&report, None, false).await.unwrap();
    let updates = store.updates();
    assert_eq!(updates, vec![(lost.kind, lost.id, None)]);

    assert!(ws.record(live).file_path.is_some());
    assert!(ws.record(ok).file_path.is_some());
    assert!(ws.record(late).file_path.is_some());
}

// =============================================================================
// Health score formula
// =============================================================================

#[tokio::test]
async fn health_score_of_mixed_population_is_92() {
    let ws = TestWorkspace::new();
    for id in 1..=85u64 {
        let object = ws.object_file(&format!("documents/2025/01/d{id}.pdf"), b"d");
        ws.add_document(FileRecord::new(id).with_file(&object));
    }
    for id in 86..=100u64 {
        let legacy = ws.legacy_file(&format!("documents/d{id}.pdf"), b"d");
        ws.add_document(FileRecord::new(id).with_file(&legacy));
    }
    for id in 1..=15u64 {
        let object = ws.object_file(&format!("activities/2025/01/a{id}.pdf"), b"a");
        ws.add_activity(FileRecord::new(id).with_file(&object));
    }
    for id in 16..=20u64 {
        ws.add_activity(FileRecord::new(id).with_file(format!("/uploads/activities/a{id}.pdf")));
    }

    let report = ws.service().health().await.unwrap();

    assert_eq!(report.object_storage_files, 100);
    assert_eq!(report.legacy_files, 15);
    assert_eq!(report.missing_files, 5);
    assert_eq!(report.documents_with_files, 100);
    assert_eq!(report.activities_with_files, 20);
    assert_eq!(report.health_score, 92);
}

// =============================================================================
// Snapshot round-trip
// =============================================================================

#[tokio::test]
async fn snapshot_round_trip_reproduces_entries_and_totals() {
    let ws = TestWorkspace::new();
    ws.legacy_file("documents/recent.pdf", b"recent");
    ws.legacy_file("events/poster.png", b"poster");
    ws.legacy_file("documents/stale.pdf", b"stale");
    ws.age_file(&ws.legacy_root().join("documents/stale.pdf"), 7);

    let service = ws.service();
    let summary = service.run_audit(6).unwrap();
    assert_eq!(summary.files_count, 2);

    let structured = summary
        .report_filenames
        .iter()
        .find(|n| n.ends_with(".json"))
        .unwrap();
    let snapshot = service.snapshotter().load_snapshot(structured).unwrap();

    let mut paths: Vec<&str> = snapshot.entries.iter().map(|e| e.path.as_str()).collect();
    paths.sort();
    assert_eq!(paths, vec!["documents/recent.pdf", "events/poster.png"]);
    assert_eq!(snapshot.totals.files, 2);
    assert_eq!(snapshot.totals.size_bytes, 12);
    assert!(snapshot.cutoff <= Utc::now());

    let bytes = service.download_report(structured).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["totals"]["files"], 2);
}

// =============================================================================
// Classifier and layout properties
// =============================================================================

proptest! {
    #[test]
    fn classify_is_total(raw in proptest::option::of("\\PC*")) {
        let policy = LayoutPolicy::default();
        let first = policy.classify(raw.as_deref());
        prop_assert_eq!(first, policy.classify(raw.as_deref()));
    }

    #[test]
    fn canonical_target_is_deterministic(
        id in 0u64..10_000,
        day in 1u32..=28,
        name in "[a-zA-Z0-9 ._-]{1,30}",
    ) {
        let policy = LayoutPolicy::default();
        let entity = EntityRef::activity(id);
        let d = date(2024, 7, day);
        let a = policy.canonical_target(entity, Some(d), &name, date(2030, 1, 1));
        let b = policy.canonical_target(entity, Some(d), &name, date(2031, 2, 2));
        prop_assert_eq!(&a, &b);
        prop_assert!(a.starts_with("/objects/activities/2024/07/"));
    }
}
