//! Legacy local filesystem backend

use async_trait::async_trait;
use recon_fs::{NormalizedPath, RobustnessConfig, io};

use super::{StorageBackend, WriteAttributes};
use crate::layout::LayoutPolicy;
use crate::{Error, Result};

/// Backend for the legacy upload directory.
///
/// A reference such as `/uploads/documents/a.pdf` maps to
/// `{root}/documents/a.pdf`. Write attributes have no meaning on local
/// disk and are ignored.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    /// Legacy storage root
    root: NormalizedPath,
    policy: LayoutPolicy,
    robustness: RobustnessConfig,
}

impl LocalBackend {
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

    /// Map a stored legacy reference to a file under the root.
    pub fn resolve(&self, path: &str) -> Result<NormalizedPath> {
        let relative = self
            .policy
            .legacy_relative(path)
            .ok_or_else(|| Error::Classification {
                path: path.to_string(),
                reason: "not a legacy local reference".into(),
            })?;

        let resolved = self.root.join(&relative);
        if !resolved.is_within(&self.root) {
            return Err(Error::Classification {
                path: path.to_string(),
                reason: "escapes the legacy root".into(),
            });
        }
        Ok(resolved)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let resolved = self.resolve(path)?;
        let present = tokio::fs::try_exists(resolved.to_native()).await?;
        Ok(present && resolved.is_file())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let resolved = self.resolve(path)?;
        match tokio::fs::read(resolved.to_native()).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(path.to_string()))
            }
            Err(e) => Err(Error::SourceRead {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn write(&self, path: &str, bytes: &[u8], _attributes: &WriteAttributes) -> Result<()> {
        let resolved = self.resolve(path)?;
        let bytes = bytes.to_vec();
        let robustness = self.robustness;
        tokio::task::spawn_blocking(move || io::write_atomic(&resolved, &bytes, robustness))
            .await
            .map_err(|e| Error::DestinationWrite {
                path: path.to_string(),
                reason: e.to_string(),
            })??;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        match tokio::fs::remove_file(resolved.to_native()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
