//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while persisting files.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file or directory the operation touched.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The advisory lock could not be acquired in time.
    #[error("timed out after {timeout:?} waiting for lock {path}")]
    LockTimeout {
        /// The lock file.
        path: PathBuf,
        /// How long we waited.
        timeout: Duration,
    },
}

impl StorageError {
    /// Creates an I/O error attributed to `path`.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors that can occur while migrating a legacy directory name.
///
/// These are recoverable: the caller skips the entry for this run.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Renaming the directory failed.
    #[error("could not migrate {from} to {to}: {source}")]
    Io {
        /// The legacy directory.
        from: PathBuf,
        /// The directory we tried to rename it to.
        to: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// Every generated name already existed.
    #[error("could not find a free name for {from} after {attempts} attempts")]
    CollisionsExhausted {
        /// The legacy directory.
        from: PathBuf,
        /// Number of names tried.
        attempts: usize,
    },
}
