//! Directory-rooted object storage backend

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recon_fs::checksum::compute_content_checksum;
use recon_fs::{NormalizedPath, RobustnessConfig, io};
use serde::{Deserialize, Serialize};

use super::{AccessPolicy, StorageBackend, WriteAttributes};
use crate::layout::LayoutPolicy;
use crate::records::EntityRef;
use crate::{Error, Result};

/// Reserved directory holding per-object metadata.
const META_DIR: &str = ".meta";

/// Metadata stored alongside every object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub content_type: String,
    pub access: AccessPolicy,
    pub checksum: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    /// Record the object was written for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<EntityRef>,
}

/// Object-storage bucket laid out on a local directory.
///
/// `/objects/<key>` lives at `{root}/<key>`; its metadata at
/// `{root}/.meta/<key>.json`, written after the bytes.
#[derive(Debug, Clone)]
pub struct ObjectBackend {
    root: NormalizedPath,
    policy: LayoutPolicy,
    robustness: RobustnessConfig,
}

impl ObjectBackend {
    pub fn new(root: NormalizedPath, policy: LayoutPolicy) -> Self {
        Self {
            root,
            policy,
            robustness: RobustnessConfig::default(),
        }
    }

    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.robustness = robustness;
        self
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    fn key(&self, path: &str) -> Result<String> {
        let key = self
            .policy
            .object_key(path)
            .ok_or_else(|| Error::Classification {
                path: path.to_string(),
                reason: "not an object storage reference".into(),
            })?;
        if key == META_DIR || key.starts_with(&format!("{}/", META_DIR)) {
            return Err(Error::Classification {
                path: path.to_string(),
                reason: "reserved metadata namespace".into(),
            });
        }
        Ok(key)
    }

    fn object_path(&self, key: &str) -> NormalizedPath {
        self.root.join(key)
    }

    fn meta_path(&self, key: &str) -> NormalizedPath {
        self.root.join(META_DIR).join(&format!("{}.json", key))
    }

    /// Stored metadata for an object, if it has any.
    pub async fn metadata(&self, path: &str) -> Result<Option<ObjectMetadata>> {
        let meta_path = self.meta_path(&self.key(path)?);
        match tokio::fs::read(meta_path.to_native()).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StorageBackend for ObjectBackend {
    fn name(&self) -> &'static str {
        "object"
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let object_path = self.object_path(&self.key(path)?);
        let present = tokio::fs::try_exists(object_path.to_native()).await?;
        Ok(present && object_path.is_file())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let object_path = self.object_path(&self.key(path)?);
        match tokio::fs::read(object_path.to_native()).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &str, bytes: &[u8], attributes: &WriteAttributes) -> Result<()> {
        let key = self.key(path)?;
        let object_path = self.object_path(&key);
        let meta_path = self.meta_path(&key);
        let metadata = ObjectMetadata {
            content_type: attributes.content_type.clone(),
            access: attributes.access,
            checksum: compute_content_checksum(bytes),
            size: bytes.len() as u64,
            uploaded_at: Utc::now(),
            owner: attributes.owner,
        };
        let meta_bytes = serde_json::to_vec_pretty(&metadata)?;
        let bytes = bytes.to_vec();
        let robustness = self.robustness;

        let written = tokio::task::spawn_blocking(move || -> recon_fs::Result<()> {
            io::write_atomic(&object_path, &bytes, robustness)?;
            io::write_atomic(&meta_path, &meta_bytes, robustness)
        })
        .await;

        match written {
            Ok(Ok(())) => {
                tracing::debug!(
                    path,
                    content_type = %attributes.content_type,
                    access = %attributes.access,
                    "Object written"
                );
                Ok(())
            }
            Ok(Err(e)) => Err(Error::DestinationWrite {
                path: path.to_string(),
                reason: e.to_string(),
            }),
            Err(e) => Err(Error::DestinationWrite {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn owner(&self, path: &str) -> Result<Option<EntityRef>> {
        Ok(self.metadata(path).await?.and_then(|meta| meta.owner))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let key = self.key(path)?;
        for target in [self.object_path(&key), self.meta_path(&key)] {
            match tokio::fs::remove_file(target.to_native()).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
