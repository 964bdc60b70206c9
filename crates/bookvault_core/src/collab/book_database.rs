//! Per-account book databases.
//!
//! The layout and content of a book database belong to the catalog layer.
//! Stores only need to open one when an account is loaded or created, and
//! delete it when the account goes away.

use crate::error::BookDatabaseError;
use crate::id::AccountId;
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A book database owned by one account.
pub trait BookDatabase: Send + Sync + Debug {
    /// The account owning this database.
    fn owner(&self) -> AccountId;

    /// The directory the database lives in.
    fn directory(&self) -> &Path;

    /// Deletes the database and everything in it.
    fn delete(&self) -> Result<(), BookDatabaseError>;
}

/// Opens book databases.
pub trait BookDatabaseFactory: Send + Sync {
    /// Opens (creating if needed) the database for `owner` in `directory`.
    fn open(&self, owner: AccountId, directory: &Path) -> Result<Arc<dyn BookDatabase>, BookDatabaseError>;
}

/// A book database that is just a directory.
#[derive(Debug)]
pub struct DirectoryBookDatabase {
    owner: AccountId,
    directory: PathBuf,
}

impl BookDatabase for DirectoryBookDatabase {
    fn owner(&self) -> AccountId {
        self.owner
    }

    fn directory(&self) -> &Path {
        &self.directory
    }

    fn delete(&self) -> Result<(), BookDatabaseError> {
        match fs::remove_dir_all(&self.directory) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BookDatabaseError::with_source(
                format!("could not delete {}", self.directory.display()),
                e,
            )),
        }
    }
}

/// Creates [`DirectoryBookDatabase`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryBookDatabaseFactory;

impl BookDatabaseFactory for DirectoryBookDatabaseFactory {
    fn open(&self, owner: AccountId, directory: &Path) -> Result<Arc<dyn BookDatabase>, BookDatabaseError> {
        fs::create_dir_all(directory).map_err(|e| {
            BookDatabaseError::with_source(format!("could not create {}", directory.display()), e)
        })?;
        Ok(Arc::new(DirectoryBookDatabase {
            owner,
            directory: directory.to_path_buf(),
        }))
    }
}
