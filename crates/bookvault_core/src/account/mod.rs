//! Accounts: one profile's binding to one content provider.

mod store;

pub use store::{AccountStore, AccountsById, AccountsByProvider};

use crate::collab::{AccountCredentials, BookDatabase, CredentialsStore, Provider};
use crate::error::{StoreError, StoreResult};
use crate::events::{AccountEvent, EventBus};
use crate::id::{AccountId, ProfileId, ProviderUri};
use crate::persist;
use bookvault_storage::AtomicFile;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// File name of an account's description.
pub const ACCOUNT_FILE: &str = "account.json";

/// Directory holding an account's book database.
pub const BOOKS_DIR: &str = "books";

/// Preferences a patron can change for an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccountPreferences {
    /// Whether bookmarks are synced with the provider.
    pub bookmark_sync_enabled: bool,
    /// Answer to the provider's age gate, if it asked.
    pub catalog_age_gate_over_13: Option<bool>,
}

/// The persisted part of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDescription {
    /// The provider the account is bound to.
    pub provider: ProviderUri,
    /// Patron preferences.
    #[serde(default)]
    pub preferences: AccountPreferences,
}

impl AccountDescription {
    /// Creates a description with default preferences.
    #[must_use]
    pub fn new(provider: ProviderUri) -> Self {
        Self {
            provider,
            preferences: AccountPreferences::default(),
        }
    }
}

/// Where an account is in the login lifecycle.
///
/// Login controllers drive the transitions; the store keeps the latest value
/// and mirrors any credentials it carries into the credentials store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountLoginState {
    /// No credentials.
    NotLoggedIn,
    /// A login attempt is running.
    LoggingIn {
        /// Progress text for the UI.
        status: String,
    },
    /// The last login attempt failed.
    LoginFailed {
        /// Why it failed.
        message: String,
    },
    /// Logged in.
    LoggedIn {
        /// The credentials in use.
        credentials: AccountCredentials,
    },
    /// A logout is running.
    LoggingOut {
        /// The credentials being logged out.
        credentials: AccountCredentials,
    },
    /// The last logout attempt failed; the credentials are still valid.
    LogoutFailed {
        /// The credentials that are still in use.
        credentials: AccountCredentials,
        /// Why it failed.
        message: String,
    },
}

impl AccountLoginState {
    /// Returns the credentials carried by this state, if any.
    #[must_use]
    pub fn credentials(&self) -> Option<&AccountCredentials> {
        match self {
            Self::LoggedIn { credentials }
            | Self::LoggingOut { credentials }
            | Self::LogoutFailed { credentials, .. } => Some(credentials),
            Self::NotLoggedIn | Self::LoggingIn { .. } | Self::LoginFailed { .. } => None,
        }
    }

    /// Returns true for [`AccountLoginState::LoggedIn`].
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn { .. })
    }
}

struct AccountState {
    description: AccountDescription,
    login_state: AccountLoginState,
}

/// A live account.
///
/// The description and login state are guarded by one lock per account.
/// Writes hold that lock while persisting, so writes to one account are
/// serialized; different accounts never contend.
pub struct Account {
    id: AccountId,
    profile: ProfileId,
    directory: PathBuf,
    provider: Arc<Provider>,
    file: AtomicFile,
    book_database: Arc<dyn BookDatabase>,
    credentials: Arc<dyn CredentialsStore>,
    events: Arc<EventBus<AccountEvent>>,
    state: Mutex<AccountState>,
}

/// Everything needed to assemble an [`Account`].
pub(crate) struct AccountParts {
    pub id: AccountId,
    pub profile: ProfileId,
    pub directory: PathBuf,
    pub provider: Arc<Provider>,
    pub file: AtomicFile,
    pub description: AccountDescription,
    pub login_state: AccountLoginState,
    pub book_database: Arc<dyn BookDatabase>,
    pub credentials: Arc<dyn CredentialsStore>,
    pub events: Arc<EventBus<AccountEvent>>,
}

impl Account {
    pub(crate) fn from_parts(parts: AccountParts) -> Self {
        Self {
            id: parts.id,
            profile: parts.profile,
            directory: parts.directory,
            provider: parts.provider,
            file: parts.file,
            book_database: parts.book_database,
            credentials: parts.credentials,
            events: parts.events,
            state: Mutex::new(AccountState {
                description: parts.description,
                login_state: parts.login_state,
            }),
        }
    }

    /// The account id.
    #[must_use]
    pub fn id(&self) -> AccountId {
        self.id
    }

    /// The profile owning the account.
    #[must_use]
    pub fn profile(&self) -> ProfileId {
        self.profile
    }

    /// The account's directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The provider the account is bound to.
    #[must_use]
    pub fn provider(&self) -> &Arc<Provider> {
        &self.provider
    }

    /// The account's book database.
    #[must_use]
    pub fn book_database(&self) -> &Arc<dyn BookDatabase> {
        &self.book_database
    }

    /// A copy of the current description.
    #[must_use]
    pub fn description(&self) -> AccountDescription {
        self.state.lock().description.clone()
    }

    /// A copy of the current preferences.
    #[must_use]
    pub fn preferences(&self) -> AccountPreferences {
        self.state.lock().description.preferences.clone()
    }

    /// Replaces the preferences.
    pub fn set_preferences(&self, preferences: AccountPreferences) -> StoreResult<()> {
        self.update_preferences(|_| preferences)
    }

    /// Applies `mutator` to the preferences, persists the result and
    /// publishes [`AccountEvent::Updated`].
    ///
    /// The in-memory value only changes if the write succeeded.
    pub fn update_preferences<F>(&self, mutator: F) -> StoreResult<()>
    where
        F: FnOnce(&AccountPreferences) -> AccountPreferences,
    {
        let mut state = self.state.lock();
        let updated = AccountDescription {
            provider: state.description.provider.clone(),
            preferences: mutator(&state.description.preferences),
        };
        persist::save_description(&self.file, &updated)?;
        state.description = updated;
        self.events.publish(AccountEvent::Updated { account: self.id });
        debug!(account = %self.id, "updated account preferences");
        Ok(())
    }

    /// The current login state.
    #[must_use]
    pub fn login_state(&self) -> AccountLoginState {
        self.state.lock().login_state.clone()
    }

    /// Sets the login state.
    ///
    /// The new state is published, then the credentials store is brought in
    /// line: credentials carried by the state are stored, otherwise any
    /// stored credentials are deleted.
    pub fn set_login_state(&self, login_state: AccountLoginState) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.login_state = login_state.clone();
        self.events.publish(AccountEvent::LoginStateChanged {
            account: self.id,
            state: login_state.clone(),
        });

        match login_state.credentials() {
            Some(credentials) => self.credentials.put(self.id, credentials)?,
            None => self.credentials.delete(self.id)?,
        }
        Ok(())
    }

    /// Deletes the account's book database, credentials and directory.
    ///
    /// Every step is attempted even if an earlier one fails.
    pub(crate) fn delete(&self) -> StoreResult<()> {
        let mut failures = Vec::new();

        if let Err(e) = self.book_database.delete() {
            failures.push(StoreError::BookDatabase(e));
        }
        if let Err(e) = self.credentials.delete(self.id) {
            failures.push(StoreError::Credentials(e));
        }
        if let Err(e) = persist::remove_directory(&self.directory) {
            failures.push(e);
        }

        info!(account = %self.id, failures = failures.len(), "deleted account");
        StoreError::merge(format!("deleting account {}", self.id), failures)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("profile", &self.profile)
            .field("provider", &self.provider.id)
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}
