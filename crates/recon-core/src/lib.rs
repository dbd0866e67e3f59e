//! Core engine of the storage reconciler
//!
//! Keeps the file references stored on business records consistent with
//! the bytes actually held in two storage backends, and moves files from
//! the legacy local tree into object storage without losing data:
//!
//! - **Layout**: pure classification of stored references and the canonical
//!   object layout
//! - **Audit**: read-only drift detection producing a `HealthReport`
//! - **Migrate**: verified copy-then-repoint migration, relink and cleanup
//! - **Snapshot**: timestamped filesystem audit artifacts of the legacy tree
//! - **Service**: a facade wiring configuration to the default adapters
//!
//! # Architecture
//!
//! ```text
//!                 recon-cli
//!                     |
//!               ReconService
//!                     |
//!     +---------+-----+------+-----------+
//!     |         |            |           |
//! HealthAuditor MigrationEngine Snapshotter BackupCatalog
//!     |         |
//!   EngineContext: RecordStore + 2 x StorageBackend
//!                     |
//!                  recon-fs
//! ```
//!
//! # Example
//!
//! ```ignore
//! use recon_core::{ConfigResolver, ReconService};
//! use recon_fs::NormalizedPath;
//!
//! let config = ConfigResolver::new(NormalizedPath::new("/srv/app")).resolve()?;
//! let service = ReconService::from_config(config)?;
//! let report = service.health().await?;
//! println!("health score {}", report.health_score);
//! ```

pub mod audit;
pub mod backend;
pub mod backup;
pub mod config;
pub mod context;
pub mod error;
pub mod layout;
pub mod migrate;
pub mod records;
pub mod service;
pub mod snapshot;

pub use audit::{DiagnosticResult, HealthAuditor, HealthReport, IssueKind};
pub use backend::{AccessPolicy, LocalBackend, ObjectBackend, StorageBackend, WriteAttributes};
pub use backup::{BackupCatalog, BackupEntry};
pub use config::{ConfigResolver, EngineConfig};
pub use context::EngineContext;
pub use error::{Error, Result};
pub use layout::{LayoutPolicy, PathClassification};
pub use migrate::{
    BatchOutcome, CancelToken, CleanupAction, CleanupStatus, MigrationEngine, MigrationTask,
    TaskStatus,
};
pub use records::{EntityKind, EntityRef, FileRecord, FileReference, LedgerStore, RecordStore};
pub use service::{AuditSummary, ReconService};
pub use snapshot::{AuditSnapshot, Category, ReportFile, Snapshotter};
