//! Command implementations for recon-cli

mod audit;
mod backups;
mod cleanup;
mod health;
mod migrate;
mod reports;

pub use audit::run_audit;
pub use backups::run_backups;
pub use cleanup::run_cleanup;
pub use health::run_health;
pub use migrate::run_migrate;
pub use reports::{run_reports_get, run_reports_list};

use std::path::PathBuf;

use recon_core::{ConfigResolver, EngineConfig, ReconService};
use recon_fs::NormalizedPath;
use serde::Serialize;

use crate::error::Result;

/// Where a command runs: the workspace root and an optional extra config.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: Option<PathBuf>,
}

impl Workspace {
    pub fn new(root: PathBuf, config: Option<PathBuf>) -> Self {
        Self { root, config }
    }

    pub fn resolve_config(&self) -> Result<EngineConfig> {
        let mut resolver = ConfigResolver::new(NormalizedPath::new(&self.root));
        if let Some(config) = &self.config {
            resolver = resolver.with_explicit_file(config);
        }
        Ok(resolver.resolve()?)
    }

    pub fn service(&self) -> Result<ReconService> {
        Ok(ReconService::from_config(self.resolve_config()?)?)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
