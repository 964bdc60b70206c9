//! CLI errors.

use bookvault_storage::MigrationError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The command needs `--path`.
    #[error("profiles directory (--path) required for {0}")]
    MissingPath(&'static str),

    /// `--path` does not point at a directory.
    #[error("no profiles directory at {}", .0.display())]
    NotADirectory(PathBuf),

    /// Reading the directory tree failed.
    #[error("could not read {}: {source}", .path.display())]
    Io {
        /// What was being read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Verification found problems.
    #[error("verification failed: {0} problem(s)")]
    VerificationFailed(usize),

    /// Some directories could not be migrated.
    #[error("{} director(ies) could not be migrated", .0.len())]
    MigrationFailed(Vec<MigrationError>),

    /// JSON output could not be produced.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
