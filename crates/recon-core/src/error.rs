//! Error types for recon-core

use std::path::PathBuf;

/// Result type for recon-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in recon-core operations
///
/// Per-record variants (classification, backend reads and writes, timeouts)
/// are captured into report data by the auditor and the migration engine.
/// Structural variants abort the whole operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A stored reference could not be interpreted
    #[error("Malformed reference {path:?}: {reason}")]
    Classification { path: String, reason: String },

    /// The legacy file could not be read
    #[error("Cannot read source {path}: {reason}")]
    SourceRead { path: String, reason: String },

    /// The object backend rejected a write or was unreachable
    #[error("Cannot write destination {path}: {reason}")]
    DestinationWrite { path: String, reason: String },

    /// The record's classified backend disagrees with where the bytes are
    #[error("Reference inconsistency for {entity}: {reason}")]
    ReferenceInconsistency { entity: String, reason: String },

    /// Cleanup was asked to act on an entry it must not touch
    #[error("Cleanup not allowed for {entity}: {reason}")]
    CleanupNotAllowed { entity: String, reason: String },

    /// A backend call exceeded its deadline
    #[error("{operation} on {path} timed out after {millis}ms")]
    Timeout {
        operation: String,
        path: String,
        millis: u64,
    },

    /// The record store is unreachable or unusable
    #[error("Record store error: {message}")]
    RecordStore { message: String },

    /// The snapshot or report directory cannot be used
    #[error("Snapshot directory {path} unusable: {message}")]
    SnapshotDirectory { path: PathBuf, message: String },

    /// Invalid engine configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A report name that does not follow the artifact naming pattern
    #[error("Invalid report name: {0}")]
    InvalidReportName(String),

    /// A migration task was refused by the idempotency guard
    #[error("Task rejected for {entity}: {reason}")]
    TaskRejected { entity: String, reason: String },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from recon-fs
    #[error(transparent)]
    Fs(#[from] recon_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    /// Whether this failure must abort a whole operation rather than be
    /// recorded against a single record.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::RecordStore { .. }
                | Self::SnapshotDirectory { .. }
                | Self::Config { .. }
                | Self::TomlDe(_)
                | Self::TomlSer(_)
        )
    }

    /// Whether this is a backend deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether the underlying cause is a missing file or object.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Fs(e) => e.is_not_found(),
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub(crate) fn record_store(message: impl std::fmt::Display) -> Self {
        Self::RecordStore {
            message: message.to_string(),
        }
    }
}
