//! Account credentials storage.

use crate::error::CredentialsError;
use crate::id::AccountId;
use bookvault_storage::{AtomicFile, WriteOptions};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Credentials a patron logged in with.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredentials {
    /// Username or barcode.
    pub username: String,
    /// Password or PIN.
    pub password: String,
    /// Bearer token obtained from the provider, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl AccountCredentials {
    /// Creates username/password credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            auth_token: None,
        }
    }
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Persistent storage of credentials, keyed by account.
pub trait CredentialsStore: Send + Sync {
    /// Returns the credentials stored for `account`.
    fn get(&self, account: AccountId) -> Result<Option<AccountCredentials>, CredentialsError>;

    /// Stores credentials for `account`, replacing any previous value.
    fn put(&self, account: AccountId, credentials: &AccountCredentials) -> Result<(), CredentialsError>;

    /// Removes any credentials stored for `account`.
    fn delete(&self, account: AccountId) -> Result<(), CredentialsError>;
}

/// Credentials kept in memory only.
#[derive(Debug, Default)]
pub struct MemoryCredentialsStore {
    entries: RwLock<HashMap<AccountId, AccountCredentials>>,
}

impl MemoryCredentialsStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CredentialsStore for MemoryCredentialsStore {
    fn get(&self, account: AccountId) -> Result<Option<AccountCredentials>, CredentialsError> {
        Ok(self.entries.read().get(&account).cloned())
    }

    fn put(&self, account: AccountId, credentials: &AccountCredentials) -> Result<(), CredentialsError> {
        self.entries.write().insert(account, credentials.clone());
        Ok(())
    }

    fn delete(&self, account: AccountId) -> Result<(), CredentialsError> {
        self.entries.write().remove(&account);
        Ok(())
    }
}

/// Credentials persisted as one JSON map, rewritten atomically on change.
#[derive(Debug)]
pub struct FileCredentialsStore {
    file: AtomicFile,
    entries: Mutex<BTreeMap<AccountId, AccountCredentials>>,
}

impl FileCredentialsStore {
    /// Opens the store at `path`, loading any existing entries.
    pub fn open(path: &Path, options: WriteOptions) -> Result<Self, CredentialsError> {
        let file = AtomicFile::for_target(path).with_options(options);
        let entries = match file.read()? {
            Some(data) if !data.is_empty() => serde_json::from_slice(&data)?,
            _ => BTreeMap::new(),
        };
        Ok(Self {
            file,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &BTreeMap<AccountId, AccountCredentials>) -> Result<(), CredentialsError> {
        let data = serde_json::to_vec_pretty(entries)?;
        self.file.write(&data)?;
        debug!(path = %self.file.target().display(), count = entries.len(), "saved credentials");
        Ok(())
    }
}

impl CredentialsStore for FileCredentialsStore {
    fn get(&self, account: AccountId) -> Result<Option<AccountCredentials>, CredentialsError> {
        Ok(self.entries.lock().get(&account).cloned())
    }

    fn put(&self, account: AccountId, credentials: &AccountCredentials) -> Result<(), CredentialsError> {
        let mut entries = self.entries.lock();
        let mut updated = entries.clone();
        updated.insert(account, credentials.clone());
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }

    fn delete(&self, account: AccountId) -> Result<(), CredentialsError> {
        let mut entries = self.entries.lock();
        if !entries.contains_key(&account) {
            return Ok(());
        }
        let mut updated = entries.clone();
        updated.remove(&account);
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }
}
