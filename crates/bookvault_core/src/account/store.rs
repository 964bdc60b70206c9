//! The per-profile account store.

use super::{
    Account, AccountDescription, AccountLoginState, AccountParts, ACCOUNT_FILE, BOOKS_DIR,
};
use crate::collab::Collaborators;
use crate::config::StoreConfig;
use crate::error::{InvariantViolation, StoreError, StoreResult};
use crate::events::{AccountEvent, EventBus};
use crate::id::{AccountId, ProfileId, ProviderUri};
use crate::persist::{self, ScannedEntry};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Accounts keyed by id.
pub type AccountsById = BTreeMap<AccountId, Arc<Account>>;

/// Accounts keyed by provider.
pub type AccountsByProvider = BTreeMap<ProviderUri, Arc<Account>>;

/// Both indices, always replaced together.
#[derive(Default)]
struct Indices {
    by_id: Arc<AccountsById>,
    by_provider: Arc<AccountsByProvider>,
}

/// The accounts of one profile.
///
/// # Thread Safety
///
/// Readers get immutable snapshots of the indices and never wait for
/// writers beyond swapping a pointer. Creating and deleting accounts is
/// serialized by a store-wide lock so both indices always change together.
///
/// # Example
///
/// ```rust,ignore
/// let store = AccountStore::open(profile_id, &root, StoreConfig::default(), collaborators, events)?;
/// let account = store.create_account(&provider_uri)?;
/// assert!(store.accounts().contains_key(&account.id()));
/// ```
pub struct AccountStore {
    profile: ProfileId,
    root: PathBuf,
    config: StoreConfig,
    collaborators: Collaborators,
    events: Arc<EventBus<AccountEvent>>,
    indices: RwLock<Indices>,
    write_lock: Mutex<()>,
}

impl AccountStore {
    /// Opens the account store rooted at `root`.
    ///
    /// The root is created if missing. Every subdirectory is loaded as an
    /// account; legacy directory names are migrated. If two accounts use the
    /// same provider, the one found later is deleted.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Structural`] if `root` exists but is not a directory
    /// - [`StoreError::Multiple`] listing every account that failed to load
    pub fn open(
        profile: ProfileId,
        root: &Path,
        config: StoreConfig,
        collaborators: Collaborators,
        events: Arc<EventBus<AccountEvent>>,
    ) -> StoreResult<Self> {
        persist::prepare_root(root)?;

        let store = Self {
            profile,
            root: root.to_path_buf(),
            config,
            collaborators,
            events,
            indices: RwLock::new(Indices::default()),
            write_lock: Mutex::new(()),
        };

        let mut by_id = AccountsById::new();
        let mut by_provider = AccountsByProvider::new();
        let mut failures = Vec::new();

        for entry in persist::scan_entries(root)? {
            let account = match store.load_account(&entry) {
                Ok(account) => Arc::new(account),
                Err(e) => {
                    warn!(path = %entry.directory.display(), error = %e, "could not load account");
                    failures.push(e);
                    continue;
                }
            };

            let provider = account.provider().id.clone();
            if let Some(existing) = by_provider.get(&provider) {
                warn!(
                    account = %account.id(),
                    existing = %existing.id(),
                    provider = %provider,
                    "deleting account with duplicate provider"
                );
                if let Err(e) = account.delete() {
                    warn!(account = %account.id(), error = %e, "could not fully delete duplicate account");
                }
                continue;
            }

            by_provider.insert(provider, Arc::clone(&account));
            by_id.insert(account.id(), account);
        }

        StoreError::merge(format!("opening accounts at {}", root.display()), failures)?;

        *store.indices.write() = Indices {
            by_id: Arc::new(by_id),
            by_provider: Arc::new(by_provider),
        };
        Ok(store)
    }

    fn load_account(&self, entry: &ScannedEntry) -> StoreResult<Account> {
        let id = AccountId::from_uuid(entry.id);
        let file = persist::description_file(&entry.directory, ACCOUNT_FILE, &self.config);
        let description: AccountDescription = persist::load_description(&file)?;

        let provider = self
            .collaborators
            .providers
            .lookup(&description.provider)
            .ok_or_else(|| StoreError::UnresolvedProvider {
                path: file.target().to_path_buf(),
                provider: description.provider.clone(),
            })?;

        let credentials = match self.collaborators.credentials.get(id) {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(account = %id, error = %e, "could not read credentials; treating as logged out");
                None
            }
        };
        let login_state = match credentials {
            Some(credentials) if provider.requires_authentication() => {
                AccountLoginState::LoggedIn { credentials }
            }
            _ => AccountLoginState::NotLoggedIn,
        };

        let book_database = self
            .collaborators
            .book_databases
            .open(id, &entry.directory.join(BOOKS_DIR))?;

        Ok(Account::from_parts(AccountParts {
            id,
            profile: self.profile,
            directory: entry.directory.clone(),
            provider,
            file,
            description,
            login_state,
            book_database,
            credentials: Arc::clone(&self.collaborators.credentials),
            events: Arc::clone(&self.events),
        }))
    }

    /// The profile owning this store.
    #[must_use]
    pub fn profile(&self) -> ProfileId {
        self.profile
    }

    /// The store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A snapshot of all accounts, keyed by id.
    #[must_use]
    pub fn accounts(&self) -> Arc<AccountsById> {
        Arc::clone(&self.indices.read().by_id)
    }

    /// A snapshot of all accounts, keyed by provider.
    #[must_use]
    pub fn accounts_by_provider(&self) -> Arc<AccountsByProvider> {
        Arc::clone(&self.indices.read().by_provider)
    }

    /// Looks up an account by id.
    #[must_use]
    pub fn account(&self, id: AccountId) -> Option<Arc<Account>> {
        self.indices.read().by_id.get(&id).cloned()
    }

    /// Looks up the account bound to `provider`.
    #[must_use]
    pub fn account_for_provider(&self, provider: &ProviderUri) -> Option<Arc<Account>> {
        self.indices.read().by_provider.get(provider).cloned()
    }

    /// Returns the number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.read().by_id.len()
    }

    /// Returns true if there are no accounts.
    ///
    /// Only possible for a freshly created, not yet populated store.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.read().by_id.is_empty()
    }

    /// Creates an account bound to `provider`.
    ///
    /// # Errors
    ///
    /// - [`InvariantViolation::UnknownProvider`] if the provider is unknown
    /// - [`InvariantViolation::DuplicateProvider`] if an account already uses it
    /// - [`InvariantViolation::IdExhausted`] if no free id could be generated
    /// - [`StoreError::Io`] if the directory or description cannot be written
    /// - [`StoreError::BookDatabase`] if the book database cannot be opened;
    ///   the account directory is left behind in that case
    pub fn create_account(&self, provider: &ProviderUri) -> StoreResult<Arc<Account>> {
        let _guard = self.write_lock.lock();

        let provider = self
            .collaborators
            .providers
            .lookup(provider)
            .ok_or_else(|| InvariantViolation::UnknownProvider(provider.clone()))?;

        if self.account_for_provider(&provider.id).is_some() {
            return Err(InvariantViolation::DuplicateProvider(provider.id.clone()).into());
        }

        let current = self.accounts();
        let id = AccountId::from_uuid(persist::fresh_id(
            &self.root,
            self.config.max_id_attempts,
            |candidate| current.contains_key(&AccountId::from_uuid(candidate)),
        )?);

        let directory = self.root.join(id.to_string());
        fs::create_dir_all(&directory).map_err(|e| StoreError::io(&directory, e))?;

        let description = AccountDescription::new(provider.id.clone());
        let file = persist::description_file(&directory, ACCOUNT_FILE, &self.config);
        persist::save_description(&file, &description)?;

        let book_database = self
            .collaborators
            .book_databases
            .open(id, &directory.join(BOOKS_DIR))?;

        let account = Arc::new(Account::from_parts(AccountParts {
            id,
            profile: self.profile,
            directory,
            provider: Arc::clone(&provider),
            file,
            description,
            login_state: AccountLoginState::NotLoggedIn,
            book_database,
            credentials: Arc::clone(&self.collaborators.credentials),
            events: Arc::clone(&self.events),
        }));

        self.swap_indices(|by_id, by_provider| {
            by_id.insert(id, Arc::clone(&account));
            by_provider.insert(provider.id.clone(), Arc::clone(&account));
        });

        info!(profile = %self.profile, account = %id, provider = %provider.id, "created account");
        self.events.publish(AccountEvent::Created {
            profile: self.profile,
            account: id,
            provider: provider.id.clone(),
        });
        Ok(account)
    }

    /// Deletes the account bound to `provider` and returns its id.
    ///
    /// The account leaves both indices first, then its book database,
    /// credentials and directory are deleted. Each of those steps is
    /// attempted even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// - [`InvariantViolation::NoSuchAccount`] if no account uses `provider`
    /// - [`InvariantViolation::LastAccount`] if it is the only account; the
    ///   store is left unchanged
    /// - [`StoreError::Multiple`] listing every failed deletion step
    pub fn delete_account_by_provider(&self, provider: &ProviderUri) -> StoreResult<AccountId> {
        let _guard = self.write_lock.lock();

        let account = self
            .account_for_provider(provider)
            .ok_or_else(|| InvariantViolation::NoSuchAccount(provider.clone()))?;
        if self.len() <= 1 {
            return Err(InvariantViolation::LastAccount.into());
        }

        let id = account.id();
        self.swap_indices(|by_id, by_provider| {
            by_id.remove(&id);
            by_provider.remove(provider);
        });

        let result = account.delete();
        self.events.publish(AccountEvent::Deleted {
            profile: self.profile,
            account: id,
            provider: provider.clone(),
        });
        result.map(|()| id)
    }

    /// Deletes every account, ignoring the last-account invariant.
    ///
    /// Used when the owning profile itself is deleted.
    pub(crate) fn delete_all(&self) -> Vec<StoreError> {
        let _guard = self.write_lock.lock();
        let accounts = self.accounts();
        self.swap_indices(|by_id, by_provider| {
            by_id.clear();
            by_provider.clear();
        });

        let mut failures = Vec::new();
        for account in accounts.values() {
            if let Err(e) = account.delete() {
                failures.push(e);
            }
            self.events.publish(AccountEvent::Deleted {
                profile: self.profile,
                account: account.id(),
                provider: account.provider().id.clone(),
            });
        }
        failures
    }

    /// Copies the indices, applies `f`, and installs the result.
    ///
    /// Callers must hold `write_lock`.
    fn swap_indices<F>(&self, f: F)
    where
        F: FnOnce(&mut AccountsById, &mut AccountsByProvider),
    {
        let mut indices = self.indices.write();
        let mut by_id = (*indices.by_id).clone();
        let mut by_provider = (*indices.by_provider).clone();
        f(&mut by_id, &mut by_provider);
        *indices = Indices {
            by_id: Arc::new(by_id),
            by_provider: Arc::new(by_provider),
        };
    }
}

impl fmt::Debug for AccountStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountStore")
            .field("profile", &self.profile)
            .field("root", &self.root)
            .field("accounts", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{
        AccountCredentials, DirectoryBookDatabaseFactory, MemoryCredentialsStore, Provider,
        ProviderAuthentication, StaticProviderCollection,
    };
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    fn uri(s: &str) -> ProviderUri {
        ProviderUri::parse(s).unwrap()
    }

    fn collaborators(credentials: Arc<MemoryCredentialsStore>) -> Collaborators {
        let providers = StaticProviderCollection::new(
            Provider::new(uri("urn:provider:x"), "X"),
            [Provider::new(uri("urn:provider:y"), "Y").with_authentication(
                ProviderAuthentication::Basic {
                    login_label: None,
                    password_label: None,
                },
            )],
        );
        Collaborators::new(
            Arc::new(providers),
            credentials,
            Arc::new(DirectoryBookDatabaseFactory),
        )
    }

    fn open(root: &Path, credentials: Arc<MemoryCredentialsStore>) -> StoreResult<AccountStore> {
        AccountStore::open(
            ProfileId::random(),
            root,
            StoreConfig::default(),
            collaborators(credentials),
            Arc::new(EventBus::new()),
        )
    }

    #[test]
    fn create_registers_in_both_indices() {
        let temp = tempdir().unwrap();
        let store = open(temp.path(), Arc::default()).unwrap();
        assert!(store.is_empty());

        let account = store.create_account(&uri("urn:provider:x")).unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.accounts().contains_key(&account.id()));
        assert_eq!(
            store.account_for_provider(&uri("urn:provider:x")).unwrap().id(),
            account.id()
        );
        assert!(account.directory().join(ACCOUNT_FILE).is_file());
        assert!(account.directory().join(BOOKS_DIR).is_dir());
    }

    #[test]
    fn snapshots_are_stable() {
        let temp = tempdir().unwrap();
        let store = open(temp.path(), Arc::default()).unwrap();
        store.create_account(&uri("urn:provider:x")).unwrap();

        let before = store.accounts();
        store.create_account(&uri("urn:provider:y")).unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(store.accounts().len(), 2);
    }

    #[test]
    fn create_rejects_unknown_and_duplicate_providers() {
        let temp = tempdir().unwrap();
        let store = open(temp.path(), Arc::default()).unwrap();
        store.create_account(&uri("urn:provider:x")).unwrap();

        let err = store.create_account(&uri("urn:provider:nope")).unwrap_err();
        assert!(matches!(
            err.invariant(),
            Some(InvariantViolation::UnknownProvider(_))
        ));

        let err = store.create_account(&uri("urn:provider:x")).unwrap_err();
        assert!(matches!(
            err.invariant(),
            Some(InvariantViolation::DuplicateProvider(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_last_account_is_refused() {
        let temp = tempdir().unwrap();
        let store = open(temp.path(), Arc::default()).unwrap();
        let account = store.create_account(&uri("urn:provider:x")).unwrap();

        let err = store
            .delete_account_by_provider(&uri("urn:provider:x"))
            .unwrap_err();
        assert_eq!(err.invariant(), Some(&InvariantViolation::LastAccount));
        assert_eq!(store.len(), 1);
        assert!(account.directory().is_dir());
    }

    #[test]
    fn delete_removes_everything() {
        let temp = tempdir().unwrap();
        let credentials = Arc::new(MemoryCredentialsStore::new());
        let store = open(temp.path(), Arc::clone(&credentials)).unwrap();
        store.create_account(&uri("urn:provider:x")).unwrap();
        let doomed = store.create_account(&uri("urn:provider:y")).unwrap();
        doomed
            .set_login_state(AccountLoginState::LoggedIn {
                credentials: AccountCredentials::new("u", "p"),
            })
            .unwrap();
        assert_eq!(credentials.len(), 1);

        let id = store
            .delete_account_by_provider(&uri("urn:provider:y"))
            .unwrap();

        assert_eq!(id, doomed.id());
        assert!(store.account(id).is_none());
        assert!(store.account_for_provider(&uri("urn:provider:y")).is_none());
        assert!(!doomed.directory().exists());
        assert!(credentials.is_empty());
    }

    #[test]
    fn delete_unknown_provider() {
        let temp = tempdir().unwrap();
        let store = open(temp.path(), Arc::default()).unwrap();
        store.create_account(&uri("urn:provider:x")).unwrap();

        let err = store
            .delete_account_by_provider(&uri("urn:provider:y"))
            .unwrap_err();
        assert!(matches!(
            err.invariant(),
            Some(InvariantViolation::NoSuchAccount(_))
        ));
    }

    #[test]
    fn reopen_restores_login_state_only_for_authenticated_providers() {
        let temp = tempdir().unwrap();
        let credentials = Arc::new(MemoryCredentialsStore::new());
        let (x, y) = {
            let store = open(temp.path(), Arc::clone(&credentials)).unwrap();
            let x = store.create_account(&uri("urn:provider:x")).unwrap();
            let y = store.create_account(&uri("urn:provider:y")).unwrap();
            for account in [&x, &y] {
                account
                    .set_login_state(AccountLoginState::LoggedIn {
                        credentials: AccountCredentials::new("u", "p"),
                    })
                    .unwrap();
            }
            (x.id(), y.id())
        };

        let store = open(temp.path(), credentials).unwrap();
        assert_eq!(
            store.account(x).unwrap().login_state(),
            AccountLoginState::NotLoggedIn
        );
        assert!(store.account(y).unwrap().login_state().is_logged_in());
    }

    #[test]
    fn open_fails_on_file_root() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("accounts");
        fs::write(&root, b"").unwrap();

        let err = open(&root, Arc::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }
}
