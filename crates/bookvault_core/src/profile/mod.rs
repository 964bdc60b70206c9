//! Profiles: named user personas owning one or more accounts.

mod store;

pub use store::{ProfileStore, ProfilesById};

use crate::account::{Account, AccountStore, AccountsById, AccountsByProvider};
use crate::error::{InvariantViolation, StoreError, StoreResult};
use crate::events::{EventBus, ProfileEvent};
use crate::id::{AccountId, ProfileId, ProviderUri};
use crate::persist;
use bookvault_storage::AtomicFile;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File name of a profile's description.
pub const PROFILE_FILE: &str = "profile.json";

/// Directory holding a profile's account store.
pub const ACCOUNTS_DIR: &str = "accounts";

/// Preferences shared by all accounts of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfilePreferences {
    /// The patron's date of birth, if given.
    pub date_of_birth: Option<NaiveDate>,
    /// The account selected most recently.
    pub most_recent_account: Option<AccountId>,
    /// Whether providers still in testing are offered.
    pub show_testing_libraries: bool,
}

/// The persisted part of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDescription {
    /// Name shown in the profile picker.
    pub display_name: String,
    /// Shared preferences.
    #[serde(default)]
    pub preferences: ProfilePreferences,
}

impl ProfileDescription {
    /// Creates a description with default preferences.
    #[must_use]
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            preferences: ProfilePreferences::default(),
        }
    }
}

/// A live profile.
///
/// Like accounts, a profile guards its description with one lock and
/// persists while holding it.
pub struct Profile {
    id: ProfileId,
    directory: PathBuf,
    file: AtomicFile,
    accounts: AccountStore,
    events: Arc<EventBus<ProfileEvent>>,
    description: Mutex<ProfileDescription>,
}

impl Profile {
    pub(crate) fn new(
        id: ProfileId,
        directory: PathBuf,
        file: AtomicFile,
        description: ProfileDescription,
        accounts: AccountStore,
        events: Arc<EventBus<ProfileEvent>>,
    ) -> Self {
        Self {
            id,
            directory,
            file,
            accounts,
            events,
            description: Mutex::new(description),
        }
    }

    /// The profile id.
    #[must_use]
    pub fn id(&self) -> ProfileId {
        self.id
    }

    /// The profile's directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The display name.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.description.lock().display_name.clone()
    }

    /// A copy of the current description.
    #[must_use]
    pub fn description(&self) -> ProfileDescription {
        self.description.lock().clone()
    }

    /// A copy of the current preferences.
    #[must_use]
    pub fn preferences(&self) -> ProfilePreferences {
        self.description.lock().preferences.clone()
    }

    /// Replaces the preferences.
    pub fn set_preferences(&self, preferences: ProfilePreferences) -> StoreResult<()> {
        self.set_description(|d| ProfileDescription {
            display_name: d.display_name.clone(),
            preferences,
        })
    }

    /// Applies `mutator` to the preferences, persists and publishes
    /// [`ProfileEvent::Updated`].
    pub fn update_preferences<F>(&self, mutator: F) -> StoreResult<()>
    where
        F: FnOnce(&ProfilePreferences) -> ProfilePreferences,
    {
        self.set_description(|d| ProfileDescription {
            display_name: d.display_name.clone(),
            preferences: mutator(&d.preferences),
        })
    }

    /// Applies `mutator` to the whole description.
    ///
    /// Display names are changed through [`ProfileStore::set_display_name`],
    /// which checks they stay unique.
    pub(crate) fn set_description<F>(&self, mutator: F) -> StoreResult<()>
    where
        F: FnOnce(&ProfileDescription) -> ProfileDescription,
    {
        self.modify_description(|d| Some(mutator(d))).map(|_| ())
    }

    /// Like [`set_description`](Self::set_description), but `mutator` may
    /// return `None` to leave the description untouched. Returns whether it
    /// was changed.
    fn modify_description<F>(&self, mutator: F) -> StoreResult<bool>
    where
        F: FnOnce(&ProfileDescription) -> Option<ProfileDescription>,
    {
        let mut description = self.description.lock();
        let Some(updated) = mutator(&description) else {
            return Ok(false);
        };
        persist::save_description(&self.file, &updated)?;
        *description = updated;
        self.events.publish(ProfileEvent::Updated(self.id));
        debug!(profile = %self.id, "updated profile description");
        Ok(true)
    }

    /// The profile's account store.
    #[must_use]
    pub fn account_store(&self) -> &AccountStore {
        &self.accounts
    }

    /// A snapshot of the profile's accounts, keyed by id.
    #[must_use]
    pub fn accounts(&self) -> Arc<AccountsById> {
        self.accounts.accounts()
    }

    /// A snapshot of the profile's accounts, keyed by provider.
    #[must_use]
    pub fn accounts_by_provider(&self) -> Arc<AccountsByProvider> {
        self.accounts.accounts_by_provider()
    }

    /// Looks up an account by id.
    #[must_use]
    pub fn account(&self, id: AccountId) -> Option<Arc<Account>> {
        self.accounts.account(id)
    }

    /// Creates an account bound to `provider`.
    pub fn create_account(&self, provider: &ProviderUri) -> StoreResult<Arc<Account>> {
        self.accounts.create_account(provider)
    }

    /// Deletes the account bound to `provider`.
    ///
    /// If it was the most recently selected account, the selection is
    /// cleared. Failing to persist that is logged; the account is gone
    /// either way and [`most_recent_account`](Self::most_recent_account)
    /// skips stale ids.
    pub fn delete_account_by_provider(&self, provider: &ProviderUri) -> StoreResult<AccountId> {
        let id = self.accounts.delete_account_by_provider(provider)?;
        let cleared = self.modify_description(|d| {
            (d.preferences.most_recent_account == Some(id)).then(|| ProfileDescription {
                display_name: d.display_name.clone(),
                preferences: ProfilePreferences {
                    most_recent_account: None,
                    ..d.preferences.clone()
                },
            })
        });
        if let Err(e) = cleared {
            warn!(profile = %self.id, account = %id, error = %e, "could not clear most recent account");
        }
        Ok(id)
    }

    /// Makes the account bound to `provider` the most recent one.
    ///
    /// # Errors
    ///
    /// [`InvariantViolation::NoSuchAccount`] if no account uses `provider`.
    pub fn select_account(&self, provider: &ProviderUri) -> StoreResult<Arc<Account>> {
        let account = self
            .accounts
            .account_for_provider(provider)
            .ok_or_else(|| InvariantViolation::NoSuchAccount(provider.clone()))?;
        let id = account.id();
        self.update_preferences(|p| ProfilePreferences {
            most_recent_account: Some(id),
            ..p.clone()
        })?;
        Ok(account)
    }

    /// The most recently selected account.
    ///
    /// Falls back to the first account by id if nothing was selected or the
    /// selected account no longer exists. Returns `None` only for a profile
    /// with no accounts, which the stores never leave behind.
    #[must_use]
    pub fn most_recent_account(&self) -> Option<Arc<Account>> {
        let accounts = self.accounts.accounts();
        self.preferences()
            .most_recent_account
            .and_then(|id| accounts.get(&id).cloned())
            .or_else(|| accounts.values().next().cloned())
    }

    /// Deletes every account and then the profile directory.
    pub(crate) fn delete(&self) -> StoreResult<()> {
        let mut failures = self.accounts.delete_all();
        if let Err(e) = persist::remove_directory(&self.directory) {
            failures.push(e);
        }
        info!(profile = %self.id, failures = failures.len(), "deleted profile");
        StoreError::merge(format!("deleting profile {}", self.id), failures)
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("id", &self.id)
            .field("directory", &self.directory)
            .field("display_name", &self.display_name())
            .field("accounts", &self.accounts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_json_shape() {
        let mut description = ProfileDescription::new("Kim");
        description.preferences.date_of_birth = NaiveDate::from_ymd_opt(2001, 2, 3);

        let json: serde_json::Value = serde_json::to_value(&description).unwrap();
        assert_eq!(json["displayName"], "Kim");
        assert_eq!(json["preferences"]["dateOfBirth"], "2001-02-03");
        assert!(json["preferences"]["mostRecentAccount"].is_null());
    }

    #[test]
    fn description_defaults_preferences() {
        let description: ProfileDescription =
            serde_json::from_str(r#"{"displayName":"Ana"}"#).unwrap();
        assert_eq!(description.preferences, ProfilePreferences::default());
    }

    #[test]
    fn description_requires_display_name() {
        assert!(serde_json::from_str::<ProfileDescription>(r#"{"preferences":{}}"#).is_err());
    }
}
