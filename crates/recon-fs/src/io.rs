//! Atomic I/O operations with file locking

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::time::Duration;

use backoff::ExponentialBackoff;
use fs2::FileExt;

use crate::{Error, NormalizedPath, Result};

/// Tunables for lock acquisition and durability of atomic writes.
#[derive(Debug, Clone, Copy)]
pub struct RobustnessConfig {
    /// How long to keep retrying the advisory lock before giving up
    pub lock_timeout: Duration,
    /// Whether to fsync the temp file before the rename
    pub enable_fsync: bool,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(10),
            enable_fsync: true,
        }
    }
}

/// Acquire an exclusive advisory lock on `lock_path`, retrying with
/// exponential backoff until `timeout` elapses.
fn acquire_lock(lock_path: &std::path::Path, timeout: Duration) -> Result<File> {
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| Error::io(lock_path, e))?;

    let policy = ExponentialBackoff {
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(250),
        max_elapsed_time: Some(timeout),
        ..ExponentialBackoff::default()
    };

    backoff::retry(policy, || {
        lock_file
            .try_lock_exclusive()
            .map_err(backoff::Error::transient)
    })
    .map_err(|_| Error::LockFailed {
        path: lock_path.to_path_buf(),
    })?;

    Ok(lock_file)
}

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename so readers observe either the old or the
/// new content, never a partial write. A sibling `<name>.lock` file
/// serializes concurrent writers.
pub fn write_atomic(path: &NormalizedPath, content: &[u8], config: RobustnessConfig) -> Result<()> {
    let native_path = path.to_native();

    if let Some(parent) = native_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let file_name = native_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lock_path = native_path.with_file_name(format!("{}.lock", file_name));
    let lock_file = acquire_lock(&lock_path, config.lock_timeout)?;

    // Same directory keeps the rename on one filesystem
    let temp_name = format!(".{}.{}.tmp", file_name, std::process::id());
    let temp_path = native_path.with_file_name(temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;

    if config.enable_fsync {
        temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;
    }
    drop(temp_file);

    fs::rename(&temp_path, &native_path).map_err(|e| Error::io(&native_path, e))?;

    // The lock file itself stays behind: unlinking it would let a waiting
    // writer and a newcomer lock two different inodes.
    lock_file.unlock().map_err(|_| Error::LockFailed { path: lock_path })?;

    Ok(())
}

/// Write content atomically, refusing to replace an existing file.
///
/// Used for artifacts that are immutable once written.
pub fn write_new(path: &NormalizedPath, content: &[u8], config: RobustnessConfig) -> Result<()> {
    if path.exists() {
        return Err(Error::AlreadyExists {
            path: path.to_native(),
        });
    }
    write_atomic(path, content, config)
}

/// Read raw bytes from a file.
pub fn read_bytes(path: &NormalizedPath) -> Result<Vec<u8>> {
    let native_path = path.to_native();
    fs::read(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Write text content to a file atomically with default robustness settings.
pub fn write_text(path: &NormalizedPath, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes(), RobustnessConfig::default())
}
