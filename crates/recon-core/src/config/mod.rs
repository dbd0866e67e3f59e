//! Engine configuration and its layered resolution
//!
//! Configuration is merged from these sources, later ones overriding
//! earlier ones key by key:
//!
//! 1. **Global** - `<config_dir>/storage-reconciler/config.toml`
//! 2. **Workspace** - `.recon/config.toml`
//! 3. **Local overrides** - `.recon/config.local.toml` (not checked in)
//!
//! # Example
//!
//! ```ignore
//! use recon_core::config::ConfigResolver;
//! use recon_fs::NormalizedPath;
//!
//! let config = ConfigResolver::new(NormalizedPath::new("/srv/app")).resolve()?;
//! println!("legacy files under {}", config.storage.legacy_root.display());
//! ```

mod engine;
mod resolver;

pub use engine::{
    BackupsSection, EngineConfig, MigrationSection, RecordsSection, SnapshotsSection,
    StorageSection,
};
pub use resolver::{CONFIG_DIR, ConfigResolver, GLOBAL_APP_DIR};
