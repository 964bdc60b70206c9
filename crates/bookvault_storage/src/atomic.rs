//! Lock-file + temp-write + rename persistence.
//!
//! Every description file is replaced with the same protocol:
//!
//! 1. Acquire an exclusive advisory lock on a dedicated lock file
//! 2. Write the new bytes to a temporary file and sync it
//! 3. Rename the temporary file over the target
//! 4. Sync the parent directory so the rename is durable
//!
//! A reader therefore sees either the old content or the complete new
//! content. If the process dies between steps 2 and 3, a stale temporary
//! file is left behind; the next write simply overwrites it.

use crate::error::{StorageError, StorageResult};
use crate::lock::FileLock;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Suffix appended to the target's file name to form the temporary file.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Name of the lock file placed next to the target.
pub const LOCK_FILE: &str = "lock";

/// Tuning for the atomic write protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// How long to wait for the advisory lock.
    pub lock_timeout: Duration,
    /// How often to retry the advisory lock while waiting.
    pub poll_interval: Duration,
    /// Whether to fsync the temporary file and directory.
    pub sync: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(10),
            sync: true,
        }
    }
}

/// A single file replaced atomically on every write.
///
/// # Example
///
/// ```no_run
/// use bookvault_storage::AtomicFile;
/// use std::path::Path;
///
/// let file = AtomicFile::for_target(Path::new("accounts/abc/account.json"));
/// file.write(b"{}").unwrap();
/// assert_eq!(file.read().unwrap().as_deref(), Some(&b"{}"[..]));
/// ```
#[derive(Debug, Clone)]
pub struct AtomicFile {
    target: PathBuf,
    temp: PathBuf,
    lock: PathBuf,
    options: WriteOptions,
}

impl AtomicFile {
    /// Creates a handle with explicit target, temporary and lock paths.
    #[must_use]
    pub fn new(target: impl Into<PathBuf>, temp: impl Into<PathBuf>, lock: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            temp: temp.into(),
            lock: lock.into(),
            options: WriteOptions::default(),
        }
    }

    /// Creates a handle using the conventional layout: `<target>.tmp` and a
    /// `lock` file in the same directory.
    #[must_use]
    pub fn for_target(target: &Path) -> Self {
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        temp_name.push(TEMP_SUFFIX);
        Self::new(target, dir.join(temp_name), dir.join(LOCK_FILE))
    }

    /// Replaces the write options.
    #[must_use]
    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the target path.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Returns the temporary path.
    #[must_use]
    pub fn temp(&self) -> &Path {
        &self.temp
    }

    /// Returns the lock file path.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock
    }

    /// Reads the current content of the target.
    ///
    /// Returns `None` if the target does not exist.
    pub fn read(&self) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(&self.target) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&self.target, e)),
        }
    }

    /// Writes `bytes` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockTimeout`] if the lock cannot be acquired,
    /// or an I/O error if writing or renaming fails. On error the target
    /// still holds its previous content.
    pub fn write(&self, bytes: &[u8]) -> StorageResult<()> {
        self.stage(bytes)?.commit()
    }

    /// Performs the first half of the protocol: locks and writes the
    /// temporary file, without touching the target.
    ///
    /// The returned [`StagedWrite`] holds the lock until it is committed or
    /// dropped. Dropping it without committing leaves the target untouched.
    pub fn stage(&self, bytes: &[u8]) -> StorageResult<StagedWrite<'_>> {
        let lock = FileLock::acquire(&self.lock, self.options.lock_timeout, self.options.poll_interval)?;

        let mut file = File::create(&self.temp).map_err(|e| StorageError::io(&self.temp, e))?;
        file.write_all(bytes)
            .map_err(|e| StorageError::io(&self.temp, e))?;
        if self.options.sync {
            file.sync_all().map_err(|e| StorageError::io(&self.temp, e))?;
        }
        drop(file);

        Ok(StagedWrite {
            file: self,
            _lock: lock,
        })
    }
}

/// A write whose temporary file is complete but not yet renamed into place.
#[derive(Debug)]
#[must_use = "a staged write does nothing until committed"]
pub struct StagedWrite<'a> {
    file: &'a AtomicFile,
    _lock: FileLock,
}

impl StagedWrite<'_> {
    /// Renames the temporary file over the target and releases the lock.
    pub fn commit(self) -> StorageResult<()> {
        let file = self.file;
        fs::rename(&file.temp, &file.target).map_err(|e| StorageError::io(&file.target, e))?;
        if file.options.sync {
            if let Some(parent) = file.target.parent() {
                sync_directory(parent)?;
            }
        }
        debug!(path = %file.target.display(), "replaced file atomically");
        Ok(())
    }
}

/// Writes `bytes` to `target` through `temp`, guarded by `lock`.
///
/// Convenience wrapper around [`AtomicFile`].
pub fn write_atomically(
    target: &Path,
    temp: &Path,
    lock: &Path,
    bytes: &[u8],
    options: WriteOptions,
) -> StorageResult<()> {
    AtomicFile::new(target, temp, lock)
        .with_options(options)
        .write(bytes)
}

/// Syncs a directory so that entry creation, rename and removal are durable.
///
/// Windows has no equivalent of fsync on a directory handle; NTFS journals
/// metadata, so this is a no-op there.
#[cfg(unix)]
pub fn sync_directory(path: &Path) -> StorageResult<()> {
    let dir = File::open(path).map_err(|e| StorageError::io(path, e))?;
    dir.sync_all().map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

/// Syncs a directory so that entry creation, rename and removal are durable.
#[cfg(not(unix))]
pub fn sync_directory(_path: &Path) -> StorageResult<()> {
    Ok(())
}
