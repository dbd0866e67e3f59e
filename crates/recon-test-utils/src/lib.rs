//! Shared test fixtures for the storage-reconciler workspace.
//!
//! A dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`workspace`] - [`TestWorkspace`] builder: temporary legacy tree, object
//!   bucket and records ledger wired into an engine
//! - [`faults`] - wrappers that inject backend and record store failures

pub mod faults;
pub mod workspace;

pub use faults::{FaultyBackend, RecordingStore};
pub use workspace::TestWorkspace;
