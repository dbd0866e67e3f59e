//! Filesystem primitives for the storage reconciler
//!
//! Provides normalized path handling, content checksums and safe I/O
//! operations shared by the storage backends and report writers.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod path;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use io::RobustnessConfig;
pub use path::{NormalizedPath, sanitize_file_name};
