//! [`TestWorkspace`] builder for engine scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use recon_core::backend::{LocalBackend, ObjectBackend, ObjectMetadata, StorageBackend};
use recon_core::records::{EntityKind, EntityRef, FileRecord, LedgerStore, RecordStore};
use recon_core::{
    AccessPolicy, ConfigResolver, EngineConfig, EngineContext, LayoutPolicy, ReconService,
};
use recon_fs::checksum::compute_content_checksum;
use recon_fs::{ConfigStore, NormalizedPath};
use tempfile::TempDir;

/// Date used for records without their own date.
pub fn fixed_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
}

/// A temporary workspace laid out like the default configuration:
/// `storage/legacy`, `storage/objects`, `.recon/records.toml`.
///
/// # Example
///
/// ```rust,no_run
/// use recon_core::FileRecord;
/// use recon_test_utils::TestWorkspace;
///
/// let ws = TestWorkspace::new();
/// let path = ws.legacy_file("documents/abc.pdf", b"%PDF");
/// ws.add_document(FileRecord::new(1).with_file(path));
/// ```
pub struct TestWorkspace {
    temp_dir: TempDir,
    config: EngineConfig,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = NormalizedPath::new(temp_dir.path());
        let config = ConfigResolver::with_global_config_dir(root, temp_dir.path().join("global"))
            .resolve()
            .unwrap();
        fs::create_dir_all(&config.storage.legacy_root).unwrap();
        fs::create_dir_all(&config.storage.object_root).unwrap();
        Self { temp_dir, config }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    pub fn legacy_root(&self) -> &Path {
        &self.config.storage.legacy_root
    }

    pub fn object_root(&self) -> &Path {
        &self.config.storage.object_root
    }

    pub fn policy(&self) -> LayoutPolicy {
        self.config.layout_policy()
    }

    /// Write `bytes` under the legacy root; returns the stored reference.
    pub fn legacy_file(&self, relative: &str, bytes: &[u8]) -> String {
        let path = self.legacy_root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();
        format!("/legacy/uploads/{}", relative)
    }

    /// Write `bytes` under the legacy root; returns its absolute disk path
    /// as the stored reference.
    pub fn absolute_legacy_file(&self, relative: &str, bytes: &[u8]) -> String {
        self.legacy_file(relative, bytes);
        NormalizedPath::new(self.legacy_root().join(relative))
            .as_str()
            .to_string()
    }

    /// Write `bytes` into the object bucket; returns the stored reference.
    pub fn object_file(&self, key: &str, bytes: &[u8]) -> String {
        let path = self.object_root().join(key);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();
        format!("/objects/{}", key)
    }

    /// Write `bytes` into the object bucket with metadata naming `owner`,
    /// as a migration of that record would; returns the stored reference.
    pub fn owned_object_file(&self, key: &str, bytes: &[u8], owner: EntityRef) -> String {
        let reference = self.object_file(key, bytes);
        let metadata = ObjectMetadata {
            content_type: "application/octet-stream".to_string(),
            access: AccessPolicy::Private,
            checksum: compute_content_checksum(bytes),
            size: bytes.len() as u64,
            uploaded_at: Utc::now(),
            owner: Some(owner),
        };
        let meta_path = self.object_root().join(".meta").join(format!("{}.json", key));
        ConfigStore::new()
            .save(&NormalizedPath::new(meta_path), &metadata)
            .unwrap();
        reference
    }

    /// Native path of an object reference.
    pub fn object_path(&self, reference: &str) -> PathBuf {
        let key = self.policy().object_key(reference).unwrap();
        self.object_root().join(key)
    }

    pub fn ledger(&self) -> LedgerStore {
        LedgerStore::new(&self.config.records.path)
    }

    pub fn add_record(&self, kind: EntityKind, record: FileRecord) -> EntityRef {
        let entity = EntityRef::new(kind, record.id);
        self.ledger().upsert(kind, record).unwrap();
        entity
    }

    pub fn add_document(&self, record: FileRecord) -> EntityRef {
        self.add_record(EntityKind::Document, record)
    }

    pub fn add_activity(&self, record: FileRecord) -> EntityRef {
        self.add_record(EntityKind::Activity, record)
    }

    /// Current state of a record straight from the ledger file.
    pub fn record(&self, entity: EntityRef) -> FileRecord {
        self.ledger()
            .load()
            .unwrap()
            .records(entity.kind)
            .iter()
            .find(|r| r.id == entity.id)
            .cloned()
            .unwrap_or_else(|| panic!("no record {}", entity))
    }

    pub fn local_backend(&self) -> Arc<dyn StorageBackend> {
        Arc::new(LocalBackend::new(
            NormalizedPath::new(self.legacy_root()),
            self.policy(),
        ))
    }

    pub fn object_backend(&self) -> Arc<dyn StorageBackend> {
        Arc::new(ObjectBackend::new(
            NormalizedPath::new(self.object_root()),
            self.policy(),
        ))
    }

    /// Context over the real adapters with a fixed `today`.
    pub fn context(&self) -> EngineContext {
        self.context_with(Arc::new(self.ledger()), self.local_backend(), self.object_backend())
    }

    /// Context over caller-supplied adapters, e.g. fault injectors.
    pub fn context_with(
        &self,
        records: Arc<dyn RecordStore>,
        local: Arc<dyn StorageBackend>,
        objects: Arc<dyn StorageBackend>,
    ) -> EngineContext {
        EngineContext::new(records, local, objects)
            .with_policy(self.policy())
            .with_deadline(self.config.migration.backend_timeout())
            .with_today(fixed_today())
    }

    pub fn service(&self) -> ReconService {
        ReconService::from_parts(self.context(), self.config.clone())
    }

    pub fn service_with(&self, ctx: EngineContext) -> ReconService {
        ReconService::from_parts(ctx, self.config.clone())
    }

    /// Set a file's modification time to `days` days ago.
    pub fn age_file(&self, path: &Path, days: u64) {
        let when = std::time::SystemTime::now() - std::time::Duration::from_secs(days * 86_400);
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(when).unwrap();
    }
}
