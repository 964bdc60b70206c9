//! Error types for bookvault core.

use crate::id::{ProfileId, ProviderUri};
use bookvault_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in profile and account stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store root exists but is not a directory.
    #[error("not a directory: {path}")]
    Structural {
        /// The offending path.
        path: PathBuf,
    },

    /// A description file could not be parsed, or referenced something
    /// that does not exist.
    #[error("could not parse {path}: {message}")]
    Parse {
        /// The file being parsed.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A description file names a provider the provider collection does
    /// not know.
    #[error("{path} refers to unknown provider {provider}")]
    UnresolvedProvider {
        /// The description file.
        path: PathBuf,
        /// The provider that was looked up.
        provider: ProviderUri,
    },

    /// Reading, writing, locking or deleting files failed.
    #[error("storage error: {0}")]
    Io(#[from] StorageError),

    /// An operation would break a store invariant.
    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    /// The book database collaborator failed.
    #[error("book database error: {0}")]
    BookDatabase(#[from] BookDatabaseError),

    /// The credentials store collaborator failed.
    #[error("credentials error: {0}")]
    Credentials(#[from] CredentialsError),

    /// Several independent failures, reported together.
    #[error("{context}: {} failure(s)", .causes.len())]
    Multiple {
        /// What was being attempted.
        context: String,
        /// Every failure, in the order encountered.
        causes: Vec<StoreError>,
    },
}

/// Broad classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The store root is not usable as a directory.
    Structural,
    /// Malformed data or an unresolvable reference.
    Parse,
    /// File system failure, including lock timeouts.
    Io,
    /// A store invariant would have been broken.
    Invariant,
    /// A collaborator (book database, credentials store) failed.
    Collaborator,
    /// An aggregate of several failures.
    Multiple,
}

impl StoreError {
    /// Creates a parse error without an underlying cause.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a parse error from a JSON error.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates an I/O error attributed to `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io(StorageError::io(path, source))
    }

    /// Merges `causes` into one [`StoreError::Multiple`].
    ///
    /// Returns `Ok(())` if there are none.
    pub fn merge(context: impl Into<String>, causes: Vec<StoreError>) -> StoreResult<()> {
        if causes.is_empty() {
            return Ok(());
        }
        Err(Self::Multiple {
            context: context.into(),
            causes,
        })
    }

    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Structural { .. } => ErrorKind::Structural,
            Self::Parse { .. } | Self::UnresolvedProvider { .. } => ErrorKind::Parse,
            Self::Io(_) => ErrorKind::Io,
            Self::Invariant(_) => ErrorKind::Invariant,
            Self::BookDatabase(_) | Self::Credentials(_) => ErrorKind::Collaborator,
            Self::Multiple { .. } => ErrorKind::Multiple,
        }
    }

    /// Returns the individual causes of this error.
    ///
    /// For [`StoreError::Multiple`] this is the full list; any other error
    /// is its own single cause.
    #[must_use]
    pub fn causes(&self) -> Vec<&StoreError> {
        match self {
            Self::Multiple { causes, .. } => causes.iter().collect(),
            other => vec![other],
        }
    }

    /// Returns the invariant that was violated, if this is an invariant error.
    #[must_use]
    pub fn invariant(&self) -> Option<&InvariantViolation> {
        match self {
            Self::Invariant(v) => Some(v),
            _ => None,
        }
    }
}

/// Store invariants that an operation refused to break.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// Deleting the account would leave the profile with no accounts.
    #[error("cannot delete the last account")]
    LastAccount,

    /// Deleting the profile would leave the store with no profiles.
    #[error("cannot delete the last profile")]
    LastProfile,

    /// No account uses the given provider.
    #[error("no account for provider {0}")]
    NoSuchAccount(ProviderUri),

    /// The provider is not known to the provider collection.
    #[error("unknown provider {0}")]
    UnknownProvider(ProviderUri),

    /// No profile has the given id.
    #[error("no such profile: {0}")]
    NoSuchProfile(ProfileId),

    /// An account for the provider already exists.
    #[error("an account for provider {0} already exists")]
    DuplicateProvider(ProviderUri),

    /// A profile with the display name already exists.
    #[error("a profile named {0:?} already exists")]
    DisplayNameTaken(String),

    /// Could not generate an unused identifier.
    #[error("could not generate a fresh identifier after {attempts} attempts")]
    IdExhausted {
        /// Number of identifiers tried.
        attempts: usize,
    },

    /// The operation is not available while the store is in anonymous mode.
    #[error("operation not permitted in anonymous profile mode")]
    AnonymousMode,
}

/// Error raised by a book database collaborator.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BookDatabaseError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BookDatabaseError {
    /// Creates an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error wrapping a cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Error raised by a credentials store collaborator.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// The backing file could not be read or written.
    #[error("credentials storage failed: {0}")]
    Storage(#[from] StorageError),

    /// The backing file is not valid.
    #[error("credentials file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}
