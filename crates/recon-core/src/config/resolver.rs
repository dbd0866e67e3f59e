//! Layered configuration resolution
//!
//! Each layer is parsed as a raw TOML table and merged key by key into the
//! layers before it, so a local override can change one field of a section
//! without restating the rest.

use std::path::PathBuf;

use recon_fs::{NormalizedPath, io};
use toml::Table;

use super::engine::EngineConfig;
use crate::{Error, Result};

/// Workspace directory holding configuration and engine state.
pub const CONFIG_DIR: &str = ".recon";
/// Directory name under the platform config dir.
pub const GLOBAL_APP_DIR: &str = "storage-reconciler";

/// Resolves the effective `EngineConfig` of a workspace
pub struct ConfigResolver {
    /// Workspace root; relative paths in any layer resolve against it
    root: NormalizedPath,

    /// Override for the global config directory (used for testing).
    /// When `None`, `dirs::config_dir()` is used.
    global_config_dir_override: Option<PathBuf>,

    /// Extra layer applied last (e.g. `--config FILE`)
    explicit: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(root: NormalizedPath) -> Self {
        Self {
            root,
            global_config_dir_override: None,
            explicit: None,
        }
    }

    /// Create a resolver with a custom global config directory.
    pub fn with_global_config_dir(root: NormalizedPath, global_config_dir: PathBuf) -> Self {
        Self {
            root,
            global_config_dir_override: Some(global_config_dir),
            explicit: None,
        }
    }

    /// Apply `path` on top of every other layer. Unlike the implicit
    /// layers it must exist.
    pub fn with_explicit_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    fn global_config_dir(&self) -> Option<PathBuf> {
        if let Some(ref override_dir) = self.global_config_dir_override {
            return Some(override_dir.clone());
        }
        dirs::config_dir().map(|d| d.join(GLOBAL_APP_DIR))
    }

    /// Workspace config file (layer 2).
    pub fn workspace_config_path(&self) -> NormalizedPath {
        self.root.join(CONFIG_DIR).join("config.toml")
    }

    /// Local override file (layer 3).
    pub fn local_config_path(&self) -> NormalizedPath {
        self.root.join(CONFIG_DIR).join("config.local.toml")
    }

    /// Merge every layer, anchor relative paths and validate.
    ///
    /// Missing layers are skipped. Invalid TOML in any layer is an error.
    pub fn resolve(&self) -> Result<EngineConfig> {
        let mut merged = Table::new();

        if let Some(global_dir) = self.global_config_dir() {
            let path = NormalizedPath::new(global_dir.join("config.toml"));
            self.apply_layer(&mut merged, &path, "global", false)?;
        }
        self.apply_layer(&mut merged, &self.workspace_config_path(), "workspace", false)?;
        self.apply_layer(&mut merged, &self.local_config_path(), "local", false)?;
        if let Some(explicit) = &self.explicit {
            let path = if explicit.is_relative() {
                self.root.join(&explicit.to_string_lossy())
            } else {
                NormalizedPath::new(explicit)
            };
            self.apply_layer(&mut merged, &path, "explicit", true)?;
        }

        let config: EngineConfig = toml::Value::Table(merged).try_into()?;
        let config = config.anchored(&self.root.to_native());
        config.validate()?;
        Ok(config)
    }

    fn apply_layer(
        &self,
        merged: &mut Table,
        path: &NormalizedPath,
        layer: &str,
        required: bool,
    ) -> Result<()> {
        if !path.is_file() {
            if required {
                return Err(Error::Config {
                    message: format!("config file {} does not exist", path),
                });
            }
            tracing::debug!(path = %path, layer, "No config found, skipping");
            return Ok(());
        }

        tracing::debug!(path = %path, layer, "Loading config layer");
        let content = io::read_text(path)?;
        let table: Table = toml::from_str(&content).map_err(|e| Error::Config {
            message: format!("{}: {}", path, e),
        })?;
        deep_merge(merged, table);
        Ok(())
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    pub fn has_config(&self) -> bool {
        self.workspace_config_path().is_file()
    }
}

/// Merge `other` into `base`; tables merge recursively, anything else is
/// replaced.
fn deep_merge(base: &mut Table, other: Table) {
    for (key, other_val) in other {
        match (base.get_mut(&key), other_val) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(other_table)) => {
                deep_merge(base_table, other_table);
            }
            (_, other_val) => {
                base.insert(key, other_val);
            }
        }
    }
}
