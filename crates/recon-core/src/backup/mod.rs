//! Read-only catalog of full-system backup archives
//!
//! Backups are produced by tooling outside this crate. The catalog only
//! enumerates them so that operators (and a guarded live cleanup) can see
//! how recent the newest one is.

mod catalog;

pub use catalog::{ARCHIVE_EXTENSIONS, BackupCatalog, BackupEntry};
