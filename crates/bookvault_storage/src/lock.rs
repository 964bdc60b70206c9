//! Advisory file locks with a bounded wait.

use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

/// An exclusive advisory lock held on a lock file.
///
/// The lock is released when the guard is dropped. Lock files are
/// zero-length and are never deleted by this crate.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    file: File,
}

impl FileLock {
    /// Acquires an exclusive lock on `path`, creating the file if needed.
    ///
    /// Polls every `poll_interval` until `timeout` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockTimeout`] if the lock is still held by
    /// someone else after `timeout`, or an I/O error if the lock file
    /// cannot be opened.
    pub fn acquire(path: &Path, timeout: Duration, poll_interval: Duration) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StorageError::io(path, e))?;

        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    trace!(path = %path.display(), "acquired file lock");
                    return Ok(Self {
                        path: path.to_path_buf(),
                        file,
                    });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if started.elapsed() >= timeout {
                        return Err(StorageError::LockTimeout {
                            path: path.to_path_buf(),
                            timeout,
                        });
                    }
                    thread::sleep(poll_interval);
                }
                Err(e) => return Err(StorageError::io(path, e)),
            }
        }
    }

    /// Returns the path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
