//! File-backed record store
//!
//! `records.toml` holds one `[[documents]]` / `[[activities]]` table per row.
//! Reads take a shared lock; updates hold an exclusive transaction lock for
//! the whole read-modify-write and replace the file atomically.

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fs2::FileExt;
use recon_fs::{NormalizedPath, RobustnessConfig, io};
use serde::{Deserialize, Serialize};

use super::{EntityKind, FileRecord, RecordStore};
use crate::{Error, Result};

/// On-disk shape of the records file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordsFile {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub documents: Vec<FileRecord>,
    #[serde(default)]
    pub activities: Vec<FileRecord>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl RecordsFile {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            ..Self::default()
        }
    }

    pub fn records(&self, kind: EntityKind) -> &[FileRecord] {
        match kind {
            EntityKind::Document => &self.documents,
            EntityKind::Activity => &self.activities,
        }
    }

    pub fn records_mut(&mut self, kind: EntityKind) -> &mut Vec<FileRecord> {
        match kind {
            EntityKind::Document => &mut self.documents,
            EntityKind::Activity => &mut self.activities,
        }
    }

    /// Insert a record, replacing any row with the same id.
    pub fn upsert(&mut self, kind: EntityKind, record: FileRecord) {
        let rows = self.records_mut(kind);
        match rows.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => rows.push(record),
        }
    }
}

/// [`RecordStore`] backed by a TOML file.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
    robustness: RobustnessConfig,
    // In-process writers; fs2 locks are per open file description and would
    // not serialize two handles opened by the same process.
    txn: Arc<Mutex<()>>,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            robustness: RobustnessConfig::default(),
            txn: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.robustness = robustness;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the records file under a shared lock.
    ///
    /// A missing file is an empty store.
    pub fn load(&self) -> Result<RecordsFile> {
        load_file(&self.path)
    }

    /// Replace the whole records file.
    pub fn save(&self, records: &RecordsFile) -> Result<()> {
        let _guard = self
            .txn
            .lock()
            .map_err(|_| Error::record_store("records lock poisoned"))?;
        save_file(&self.path, records, self.robustness)
    }

    /// Insert or replace one row.
    pub fn upsert(&self, kind: EntityKind, record: FileRecord) -> Result<()> {
        self.transact(move |file| {
            file.upsert(kind, record);
            Ok(())
        })
    }

    /// Run `change` against the current contents and persist the result,
    /// holding both the in-process and the cross-process lock throughout.
    fn transact<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut RecordsFile) -> Result<()>,
    {
        let _guard = self
            .txn
            .lock()
            .map_err(|_| Error::record_store("records lock poisoned"))?;

        let txn_path = sibling(&self.path, "txn");
        if let Some(parent) = txn_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let txn_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&txn_path)?;
        txn_file.lock_exclusive()?;

        let mut records = load_file(&self.path)?;
        change(&mut records)?;
        save_file(&self.path, &records, self.robustness)?;

        // Lock released when txn_file is dropped
        Ok(())
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.{}", name, suffix))
}

fn load_file(path: &Path) -> Result<RecordsFile> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RecordsFile::new()),
        Err(e) => return Err(Error::record_store(format!("{}: {}", path.display(), e))),
    };
    file.lock_shared()
        .map_err(|e| Error::record_store(format!("{}: {}", path.display(), e)))?;

    // Read through the locked handle
    let mut content = String::new();
    (&file)
        .read_to_string(&mut content)
        .map_err(|e| Error::record_store(format!("{}: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::record_store(format!("{}: {}", path.display(), e)))
}

fn save_file(path: &Path, records: &RecordsFile, robustness: RobustnessConfig) -> Result<()> {
    let content = toml::to_string_pretty(records)?;
    io::write_atomic(&NormalizedPath::new(path), content.as_bytes(), robustness)?;
    Ok(())
}

#[async_trait]
impl RecordStore for LedgerStore {
    async fn list_file_bearing_records(&self, kind: EntityKind) -> Result<Vec<FileRecord>> {
        let store = self.clone();
        let records = tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(Error::record_store)??;
        Ok(records.records(kind).to_vec())
    }

    async fn update_file_reference(
        &self,
        kind: EntityKind,
        id: u64,
        new_path: Option<&str>,
    ) -> Result<()> {
        let store = self.clone();
        let new_path = new_path.map(str::to_string);
        tokio::task::spawn_blocking(move || {
            store.transact(|file| {
                let record = file
                    .records_mut(kind)
                    .iter_mut()
                    .find(|r| r.id == id)
                    .ok_or_else(|| Error::NotFound(format!("{}:{}", kind, id)))?;
                match new_path {
                    Some(path) => record.file_path = Some(path),
                    None => {
                        record.file_path = None;
                        record.file_name = None;
                        record.file_type = None;
                    }
                }
                Ok(())
            })
        })
        .await
        .map_err(Error::record_store)?
    }
}
