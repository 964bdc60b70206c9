//! Collaborators that fail on demand.
//!
//! Stores must keep going when a collaborator fails during a best-effort
//! operation, and must report every failure. These doubles let tests flip
//! individual operations into failure at any point.

use bookvault_core::collab::{
    AccountCredentials, BookDatabase, BookDatabaseFactory, CredentialsStore,
    DirectoryBookDatabaseFactory, MemoryCredentialsStore,
};
use bookvault_core::{AccountId, BookDatabaseError, CredentialsError};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A switch shared between a test and the doubles it controls.
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch(Arc<AtomicBool>);

impl FaultSwitch {
    /// Creates a switch that is off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns failures on or off.
    pub fn set(&self, failing: bool) {
        self.0.store(failing, Ordering::SeqCst);
    }

    /// Returns true if failures are on.
    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Book database factory whose databases can be told to fail.
#[derive(Debug, Default)]
pub struct FailingBookDatabaseFactory {
    /// Fails [`BookDatabaseFactory::open`].
    pub fail_open: FaultSwitch,
    /// Fails [`BookDatabase::delete`] on every database opened so far or later.
    pub fail_delete: FaultSwitch,
    deletes: Arc<AtomicUsize>,
}

impl FailingBookDatabaseFactory {
    /// Creates a factory that does not fail yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of delete attempts made on databases from this factory.
    pub fn delete_attempts(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

impl BookDatabaseFactory for FailingBookDatabaseFactory {
    fn open(&self, owner: AccountId, directory: &Path) -> Result<Arc<dyn BookDatabase>, BookDatabaseError> {
        if self.fail_open.is_on() {
            return Err(BookDatabaseError::new("injected open failure"));
        }
        let inner = DirectoryBookDatabaseFactory.open(owner, directory)?;
        Ok(Arc::new(FailingBookDatabase {
            inner,
            fail_delete: self.fail_delete.clone(),
            deletes: Arc::clone(&self.deletes),
        }))
    }
}

#[derive(Debug)]
struct FailingBookDatabase {
    inner: Arc<dyn BookDatabase>,
    fail_delete: FaultSwitch,
    deletes: Arc<AtomicUsize>,
}

impl BookDatabase for FailingBookDatabase {
    fn owner(&self) -> AccountId {
        self.inner.owner()
    }

    fn directory(&self) -> &Path {
        self.inner.directory()
    }

    fn delete(&self) -> Result<(), BookDatabaseError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.is_on() {
            return Err(BookDatabaseError::new("injected delete failure"));
        }
        self.inner.delete()
    }
}

/// Credentials store whose operations can be told to fail.
#[derive(Debug, Default)]
pub struct FailingCredentialsStore {
    /// The store used while nothing fails.
    pub inner: MemoryCredentialsStore,
    /// Fails [`CredentialsStore::get`].
    pub fail_get: FaultSwitch,
    /// Fails [`CredentialsStore::put`].
    pub fail_put: FaultSwitch,
    /// Fails [`CredentialsStore::delete`].
    pub fail_delete: FaultSwitch,
}

impl FailingCredentialsStore {
    /// Creates a store that does not fail yet.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialsStore for FailingCredentialsStore {
    fn get(&self, account: AccountId) -> Result<Option<AccountCredentials>, CredentialsError> {
        if self.fail_get.is_on() {
            return Err(CredentialsError::Other("injected get failure".into()));
        }
        self.inner.get(account)
    }

    fn put(&self, account: AccountId, credentials: &AccountCredentials) -> Result<(), CredentialsError> {
        if self.fail_put.is_on() {
            return Err(CredentialsError::Other("injected put failure".into()));
        }
        self.inner.put(account, credentials)
    }

    fn delete(&self, account: AccountId) -> Result<(), CredentialsError> {
        if self.fail_delete.is_on() {
            return Err(CredentialsError::Other("injected delete failure".into()));
        }
        self.inner.delete(account)
    }
}
