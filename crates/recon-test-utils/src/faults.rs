//! Fault-injecting wrappers around the two engine seams.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use recon_core::backend::{StorageBackend, WriteAttributes};
use recon_core::records::{EntityKind, EntityRef, FileRecord, RecordStore};
use recon_core::{Error, Result};

/// Failure modes of a [`FaultyBackend`]
#[derive(Debug, Clone, Default)]
struct Faults {
    fail_writes: bool,
    drop_writes: bool,
    fail_reads: bool,
    fail_exists: bool,
    exists_delay: Option<Duration>,
    read_delay: Option<Duration>,
}

/// Wraps a backend and injects failures.
pub struct FaultyBackend {
    inner: Arc<dyn StorageBackend>,
    faults: Mutex<Faults>,
    writes: AtomicUsize,
}

impl FaultyBackend {
    pub fn new(inner: Arc<dyn StorageBackend>) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Every write is rejected.
    pub fn fail_writes(self) -> Self {
        self.faults.lock().unwrap().fail_writes = true;
        self
    }

    /// Writes report success without storing anything.
    pub fn drop_writes(self) -> Self {
        self.faults.lock().unwrap().drop_writes = true;
        self
    }

    pub fn fail_reads(self) -> Self {
        self.faults.lock().unwrap().fail_reads = true;
        self
    }

    pub fn fail_exists(self) -> Self {
        self.faults.lock().unwrap().fail_exists = true;
        self
    }

    pub fn slow_exists(self, delay: Duration) -> Self {
        self.faults.lock().unwrap().exists_delay = Some(delay);
        self
    }

    pub fn slow_reads(self, delay: Duration) -> Self {
        self.faults.lock().unwrap().read_delay = Some(delay);
        self
    }

    /// Writes that reached the inner backend.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn faults(&self) -> Faults {
        self.faults.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageBackend for FaultyBackend {
    fn name(&self) -> &'static str {
        "faulty"
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let faults = self.faults();
        if let Some(delay) = faults.exists_delay {
            tokio::time::sleep(delay).await;
        }
        if faults.fail_exists {
            return Err(Error::DestinationWrite {
                path: path.to_string(),
                reason: "injected: backend unreachable".into(),
            });
        }
        self.inner.exists(path).await
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let faults = self.faults();
        if let Some(delay) = faults.read_delay {
            tokio::time::sleep(delay).await;
        }
        if faults.fail_reads {
            return Err(Error::SourceRead {
                path: path.to_string(),
                reason: "injected: permission denied".into(),
            });
        }
        self.inner.read(path).await
    }

    async fn write(&self, path: &str, bytes: &[u8], attributes: &WriteAttributes) -> Result<()> {
        let faults = self.faults();
        if faults.fail_writes {
            return Err(Error::DestinationWrite {
                path: path.to_string(),
                reason: "injected: bucket rejected write".into(),
            });
        }
        if faults.drop_writes {
            return Ok(());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(path, bytes, attributes).await
    }

    async fn owner(&self, path: &str) -> Result<Option<EntityRef>> {
        if self.faults().fail_exists {
            return Err(Error::DestinationWrite {
                path: path.to_string(),
                reason: "injected: backend unreachable".into(),
            });
        }
        self.inner.owner(path).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.inner.delete(path).await
    }
}

/// Wraps a record store, counts updates and can simulate an outage.
pub struct RecordingStore {
    inner: Arc<dyn RecordStore>,
    updates: Mutex<Vec<(EntityKind, u64, Option<String>)>>,
    unreachable: AtomicBool,
    fail_updates: AtomicBool,
}

impl RecordingStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            updates: Mutex::new(Vec::new()),
            unreachable: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
        }
    }

    /// Every call fails with a record store error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Updates fail with a record store error; reads still work.
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Successful updates, in order.
    pub fn updates(&self) -> Vec<(EntityKind, u64, Option<String>)> {
        self.updates.lock().unwrap().clone()
    }

    fn outage(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::RecordStore {
                message: "injected: connection refused".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for RecordingStore {
    async fn list_file_bearing_records(&self, kind: EntityKind) -> Result<Vec<FileRecord>> {
        self.outage()?;
        self.inner.list_file_bearing_records(kind).await
    }

    async fn update_file_reference(
        &self,
        kind: EntityKind,
        id: u64,
        new_path: Option<&str>,
    ) -> Result<()> {
        self.outage()?;
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Error::RecordStore {
                message: "injected: update rejected".into(),
            });
        }
        self.inner.update_file_reference(kind, id, new_path).await?;
        self.updates
            .lock()
            .unwrap()
            .push((kind, id, new_path.map(str::to_string)));
        Ok(())
    }
}
