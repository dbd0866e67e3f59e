//! Storage backend abstraction
//!
//! Provides one async interface over the two physical stores: the legacy
//! local upload directory and the object-storage bucket. Paths passed in are
//! stored references (`/uploads/...`, `/objects/...`); each adapter maps
//! them under its own root.

mod local;
mod object;

pub use local::LocalBackend;
pub use object::{ObjectBackend, ObjectMetadata};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::records::EntityRef;
use crate::{Error, Result};

/// Access-control attribute attached to objects at write time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessPolicy {
    Public,
    #[default]
    Private,
}

impl std::fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Private => f.write_str("private"),
        }
    }
}

/// What a write attaches to the stored bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAttributes {
    pub content_type: String,
    pub access: AccessPolicy,
    /// Record the bytes are stored for, if any
    pub owner: Option<EntityRef>,
}

impl WriteAttributes {
    pub fn new(content_type: impl Into<String>, access: AccessPolicy) -> Self {
        Self {
            content_type: content_type.into(),
            access,
            owner: None,
        }
    }

    pub fn owned_by(mut self, owner: EntityRef) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Trait for physical storage operations.
///
/// Implementations must be safe to call concurrently for different paths
/// and hold no shared mutable state of their own.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short label used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Whether bytes are present at `path`.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Read all bytes at `path`; `Error::NotFound` when absent.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Store `bytes` at `path`, replacing any previous object.
    async fn write(&self, path: &str, bytes: &[u8], attributes: &WriteAttributes) -> Result<()>;

    /// Owner recorded by the write that stored `path`. Backends that keep
    /// no metadata know no owner.
    async fn owner(&self, _path: &str) -> Result<Option<EntityRef>> {
        Ok(None)
    }

    /// Remove the bytes at `path`. Removing an absent path succeeds.
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Run one backend call under a deadline.
///
/// Expiry becomes `Error::Timeout` so callers can record it like any other
/// per-record failure instead of hanging a batch.
pub async fn with_deadline<T, F>(
    operation: &str,
    path: &str,
    deadline: Duration,
    call: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => {
            let millis = deadline.as_millis() as u64;
            tracing::warn!(operation, path, millis, "Backend call timed out");
            Err(Error::Timeout {
                operation: operation.to_string(),
                path: path.to_string(),
                millis: deadline.as_millis() as u64,
            })
        }
    }
}

/// Find the copy a previous migration of `entity` left in `objects`.
///
/// `candidates` comes from [`LayoutPolicy::migrated_locations`]. The
/// entity-suffixed target belongs to `entity` alone. The plain canonical
/// target is shared by every record with the same kind, name and month, so
/// it only counts when its recorded owner is `entity`.
///
/// [`LayoutPolicy::migrated_locations`]: crate::layout::LayoutPolicy::migrated_locations
pub async fn find_migrated_copy(
    objects: &dyn StorageBackend,
    candidates: [String; 2],
    entity: EntityRef,
    deadline: Duration,
) -> Result<Option<String>> {
    let [suffixed, plain] = candidates;
    if with_deadline("exists", &suffixed, deadline, objects.exists(&suffixed)).await? {
        return Ok(Some(suffixed));
    }
    if !with_deadline("exists", &plain, deadline, objects.exists(&plain)).await? {
        return Ok(None);
    }

    let owner = with_deadline("owner", &plain, deadline, objects.owner(&plain)).await?;
    if owner == Some(entity) {
        Ok(Some(plain))
    } else {
        tracing::debug!(%entity, target = %plain, ?owner, "Target belongs to another record");
        Ok(None)
    }
}

/// MIME type for a file, from its recorded type or its extension.
pub fn content_type_for(file_type: Option<&str>, file_name: &str) -> String {
    if let Some(file_type) = file_type.filter(|t| t.contains('/')) {
        return file_type.to_string();
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "odt" => "application/vnd.oasis.opendocument.text",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("application/pdf"), "x.bin", "application/pdf")]
    #[case(None, "Ata.PDF", "application/pdf")]
    #[case(
        Some("pdf"),
        "a.docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    )]
    #[case(None, "photo.jpeg", "image/jpeg")]
    #[case(None, "noext", "application/octet-stream")]
    fn content_type_detection(
        #[case] file_type: Option<&str>,
        #[case] name: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(content_type_for(file_type, name), expected);
    }

    #[tokio::test]
    async fn deadline_expiry_becomes_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        };
        let result: Result<()> =
            with_deadline("exists", "/objects/a", Duration::from_millis(10), slow).await;

        match result {
            Err(Error::Timeout { operation, millis, .. }) => {
                assert_eq!(operation, "exists");
                assert_eq!(millis, 10);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deadline_passes_through_result() {
        let value = with_deadline("read", "/uploads/a", Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn access_policy_defaults_private() {
        assert_eq!(AccessPolicy::default(), AccessPolicy::Private);
        assert_eq!(AccessPolicy::Public.to_string(), "public");
    }
}
