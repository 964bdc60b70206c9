//! The profile store.

use super::{Profile, ProfileDescription, ACCOUNTS_DIR, PROFILE_FILE};
use crate::account::AccountStore;
use crate::collab::Collaborators;
use crate::config::StoreConfig;
use crate::error::{InvariantViolation, StoreError, StoreResult};
use crate::events::{AccountEvent, EventBus, ProfileEvent, Subscription};
use crate::id::{ProfileId, ProviderUri};
use crate::persist::{self, ScannedEntry};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Profiles keyed by id.
pub type ProfilesById = BTreeMap<ProfileId, Arc<Profile>>;

/// All profiles on one device.
///
/// The layout mirrors the account store one level up; each profile directory
/// holds an `accounts/` directory that is the root of the profile's
/// [`AccountStore`].
///
/// # Example
///
/// ```rust,ignore
/// let store = ProfileStore::open(&root, StoreConfig::default(), collaborators)?;
/// let profile = store.create_profile(&provider_uri, "Kim")?;
/// store.set_current_profile(profile.id())?;
/// ```
pub struct ProfileStore {
    root: PathBuf,
    config: StoreConfig,
    collaborators: Collaborators,
    profile_events: Arc<EventBus<ProfileEvent>>,
    account_events: Arc<EventBus<AccountEvent>>,
    profiles: RwLock<Arc<ProfilesById>>,
    current: RwLock<Option<ProfileId>>,
    write_lock: Mutex<()>,
}

impl ProfileStore {
    /// Opens the profile store rooted at `root`.
    ///
    /// Every subdirectory is loaded as a profile, migrating legacy names. A
    /// profile whose account store is empty gets an account for the default
    /// provider. Duplicate display names are logged and kept.
    ///
    /// In anonymous mode a profile is created if none exists, and it becomes
    /// the current profile.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Structural`] if `root` exists but is not a directory
    /// - [`StoreError::Multiple`] listing every profile that failed to load
    pub fn open(root: &Path, config: StoreConfig, collaborators: Collaborators) -> StoreResult<Self> {
        persist::prepare_root(root)?;

        let store = Self {
            root: root.to_path_buf(),
            config,
            collaborators,
            profile_events: Arc::new(EventBus::new()),
            account_events: Arc::new(EventBus::new()),
            profiles: RwLock::new(Arc::default()),
            current: RwLock::new(None),
            write_lock: Mutex::new(()),
        };

        let mut profiles = ProfilesById::new();
        let mut failures = Vec::new();
        for entry in persist::scan_entries(root)? {
            match store.load_profile(&entry) {
                Ok(profile) => {
                    let name = profile.display_name();
                    if let Some(existing) = profiles.values().find(|p| p.display_name() == name) {
                        warn!(
                            profile = %profile.id(),
                            existing = %existing.id(),
                            display_name = %name,
                            "profiles share a display name"
                        );
                    }
                    profiles.insert(profile.id(), Arc::new(profile));
                }
                Err(e) => {
                    warn!(path = %entry.directory.display(), error = %e, "could not load profile");
                    failures.push(e);
                }
            }
        }

        StoreError::merge(format!("opening profiles at {}", root.display()), failures)?;
        *store.profiles.write() = Arc::new(profiles);

        if store.config.anonymous {
            store.open_anonymous()?;
        }
        Ok(store)
    }

    fn load_profile(&self, entry: &ScannedEntry) -> StoreResult<Profile> {
        let id = ProfileId::from_uuid(entry.id);
        let file = persist::description_file(&entry.directory, PROFILE_FILE, &self.config);
        let description: ProfileDescription = persist::load_description(&file)?;

        let accounts = self.open_accounts(id, &entry.directory)?;
        if accounts.is_empty() {
            let provider = self.collaborators.providers.default_provider();
            info!(profile = %id, provider = %provider.id, "profile has no accounts; creating one");
            accounts.create_account(&provider.id)?;
        }

        Ok(Profile::new(
            id,
            entry.directory.clone(),
            file,
            description,
            accounts,
            Arc::clone(&self.profile_events),
        ))
    }

    fn open_accounts(&self, id: ProfileId, directory: &Path) -> StoreResult<AccountStore> {
        AccountStore::open(
            id,
            &directory.join(ACCOUNTS_DIR),
            self.config.clone(),
            self.collaborators.clone(),
            Arc::clone(&self.account_events),
        )
    }

    fn open_anonymous(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock();
        let profiles = self.profiles();
        let profile = match profiles.values().next() {
            Some(profile) => {
                if profiles.len() > 1 {
                    warn!(count = profiles.len(), "anonymous mode found several profiles; using the first");
                }
                Arc::clone(profile)
            }
            None => {
                let provider = self.collaborators.providers.default_provider();
                self.create_profile_locked(&provider.id, "")?
            }
        };
        *self.current.write() = Some(profile.id());
        debug!(profile = %profile.id(), "anonymous profile selected");
        Ok(())
    }

    /// The store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if the store runs in anonymous mode.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.config.anonymous
    }

    /// A snapshot of all profiles, keyed by id.
    #[must_use]
    pub fn profiles(&self) -> Arc<ProfilesById> {
        Arc::clone(&self.profiles.read())
    }

    /// All profiles keyed by display name.
    ///
    /// If several profiles share a name, the one with the lowest id wins.
    #[must_use]
    pub fn profiles_by_display_name(&self) -> BTreeMap<String, Arc<Profile>> {
        let mut by_name = BTreeMap::new();
        for profile in self.profiles().values() {
            by_name
                .entry(profile.display_name())
                .or_insert_with(|| Arc::clone(profile));
        }
        by_name
    }

    /// Looks up a profile by id.
    #[must_use]
    pub fn profile(&self, id: ProfileId) -> Option<Arc<Profile>> {
        self.profiles.read().get(&id).cloned()
    }

    /// Finds the profile with the given display name.
    #[must_use]
    pub fn find_profile_with_display_name(&self, name: &str) -> Option<Arc<Profile>> {
        self.profiles()
            .values()
            .find(|p| p.display_name() == name)
            .cloned()
    }

    /// Returns the number of profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    /// Returns true if there are no profiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }

    /// Creates a profile named `display_name` with one account for
    /// `provider`.
    ///
    /// # Errors
    ///
    /// - [`InvariantViolation::AnonymousMode`] in anonymous mode
    /// - [`InvariantViolation::UnknownProvider`] if the provider is unknown
    /// - [`InvariantViolation::DisplayNameTaken`] if another profile has the name
    /// - [`InvariantViolation::IdExhausted`] if no free id could be generated
    /// - [`StoreError::Io`] if the directory or description cannot be written
    pub fn create_profile(&self, provider: &ProviderUri, display_name: &str) -> StoreResult<Arc<Profile>> {
        if self.config.anonymous {
            return Err(InvariantViolation::AnonymousMode.into());
        }
        let _guard = self.write_lock.lock();
        self.create_profile_locked(provider, display_name)
    }

    fn create_profile_locked(&self, provider: &ProviderUri, display_name: &str) -> StoreResult<Arc<Profile>> {
        if self.collaborators.providers.lookup(provider).is_none() {
            return Err(InvariantViolation::UnknownProvider(provider.clone()).into());
        }
        if self.find_profile_with_display_name(display_name).is_some() {
            return Err(InvariantViolation::DisplayNameTaken(display_name.to_string()).into());
        }

        let current = self.profiles();
        let id = ProfileId::from_uuid(persist::fresh_id(
            &self.root,
            self.config.max_id_attempts,
            |candidate| current.contains_key(&ProfileId::from_uuid(candidate)),
        )?);

        let directory = self.root.join(id.to_string());
        fs::create_dir_all(&directory).map_err(|e| StoreError::io(&directory, e))?;

        match self.populate_profile(id, &directory, display_name, provider) {
            Ok(profile) => {
                let profile = Arc::new(profile);
                self.swap_profiles(|profiles| {
                    profiles.insert(id, Arc::clone(&profile));
                });
                info!(profile = %id, display_name = %display_name, "created profile");
                self.profile_events.publish(ProfileEvent::Created(id));
                Ok(profile)
            }
            Err(e) => {
                if let Err(cleanup) = persist::remove_directory(&directory) {
                    warn!(profile = %id, error = %cleanup, "could not clean up half-created profile");
                }
                Err(e)
            }
        }
    }

    fn populate_profile(
        &self,
        id: ProfileId,
        directory: &Path,
        display_name: &str,
        provider: &ProviderUri,
    ) -> StoreResult<Profile> {
        let description = ProfileDescription::new(display_name);
        let file = persist::description_file(directory, PROFILE_FILE, &self.config);
        persist::save_description(&file, &description)?;

        let accounts = self.open_accounts(id, directory)?;
        accounts.create_account(provider)?;

        Ok(Profile::new(
            id,
            directory.to_path_buf(),
            file,
            description,
            accounts,
            Arc::clone(&self.profile_events),
        ))
    }

    /// Deletes a profile with all its accounts.
    ///
    /// If it was the current profile, no profile is current afterwards.
    ///
    /// # Errors
    ///
    /// - [`InvariantViolation::AnonymousMode`] in anonymous mode
    /// - [`InvariantViolation::NoSuchProfile`] if `id` is unknown
    /// - [`InvariantViolation::LastProfile`] if it is the only profile
    /// - [`StoreError::Multiple`] listing every failed deletion step
    pub fn delete_profile(&self, id: ProfileId) -> StoreResult<()> {
        if self.config.anonymous {
            return Err(InvariantViolation::AnonymousMode.into());
        }
        let _guard = self.write_lock.lock();

        let profile = self
            .profile(id)
            .ok_or(InvariantViolation::NoSuchProfile(id))?;
        if self.len() <= 1 {
            return Err(InvariantViolation::LastProfile.into());
        }

        self.swap_profiles(|profiles| {
            profiles.remove(&id);
        });
        {
            let mut current = self.current.write();
            if *current == Some(id) {
                *current = None;
            }
        }

        let result = profile.delete();
        self.profile_events.publish(ProfileEvent::Deleted(id));
        result
    }

    /// Renames a profile.
    ///
    /// # Errors
    ///
    /// - [`InvariantViolation::NoSuchProfile`] if `id` is unknown
    /// - [`InvariantViolation::DisplayNameTaken`] if another profile has the name
    pub fn set_display_name(&self, id: ProfileId, display_name: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock();
        let profile = self
            .profile(id)
            .ok_or(InvariantViolation::NoSuchProfile(id))?;
        if let Some(other) = self.find_profile_with_display_name(display_name) {
            if other.id() != id {
                return Err(InvariantViolation::DisplayNameTaken(display_name.to_string()).into());
            }
        }
        profile.set_description(|d| ProfileDescription {
            display_name: display_name.to_string(),
            preferences: d.preferences.clone(),
        })
    }

    /// The current profile, if one was selected.
    ///
    /// In anonymous mode this is always the anonymous profile.
    #[must_use]
    pub fn current_profile(&self) -> Option<Arc<Profile>> {
        let current = *self.current.read();
        current.and_then(|id| self.profile(id))
    }

    /// Makes `id` the current profile and publishes
    /// [`ProfileEvent::Selected`].
    ///
    /// # Errors
    ///
    /// [`InvariantViolation::NoSuchProfile`] if `id` is unknown.
    pub fn set_current_profile(&self, id: ProfileId) -> StoreResult<Arc<Profile>> {
        let profile = self
            .profile(id)
            .ok_or(InvariantViolation::NoSuchProfile(id))?;
        *self.current.write() = Some(id);
        self.profile_events.publish(ProfileEvent::Selected(id));
        Ok(profile)
    }

    /// The bus carrying profile events.
    #[must_use]
    pub fn profile_events(&self) -> &Arc<EventBus<ProfileEvent>> {
        &self.profile_events
    }

    /// The bus carrying account events for every profile.
    #[must_use]
    pub fn account_events(&self) -> &Arc<EventBus<AccountEvent>> {
        &self.account_events
    }

    /// Subscribes to profile events.
    pub fn subscribe(&self) -> Subscription<ProfileEvent> {
        self.profile_events.subscribe()
    }

    /// Callers must hold `write_lock`.
    fn swap_profiles<F>(&self, f: F)
    where
        F: FnOnce(&mut ProfilesById),
    {
        let mut profiles = self.profiles.write();
        let mut updated = (**profiles).clone();
        f(&mut updated);
        *profiles = Arc::new(updated);
    }
}

impl fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileStore")
            .field("root", &self.root)
            .field("profiles", &self.len())
            .field("current", &*self.current.read())
            .field("anonymous", &self.config.anonymous)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{
        DirectoryBookDatabaseFactory, MemoryCredentialsStore, Provider, StaticProviderCollection,
    };
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    fn uri(s: &str) -> ProviderUri {
        ProviderUri::parse(s).unwrap()
    }

    fn collaborators() -> Collaborators {
        let providers = StaticProviderCollection::new(
            Provider::new(uri("urn:provider:x"), "X"),
            [Provider::new(uri("urn:provider:y"), "Y")],
        );
        Collaborators::new(
            Arc::new(providers),
            Arc::new(MemoryCredentialsStore::new()),
            Arc::new(DirectoryBookDatabaseFactory),
        )
    }

    fn open(root: &Path) -> StoreResult<ProfileStore> {
        ProfileStore::open(root, StoreConfig::default(), collaborators())
    }

    #[test]
    fn create_profile_with_initial_account() {
        let temp = tempdir().unwrap();
        let store = open(temp.path()).unwrap();
        let events = store.subscribe();

        let profile = store.create_profile(&uri("urn:provider:y"), "Kim").unwrap();

        assert_eq!(profile.display_name(), "Kim");
        assert_eq!(profile.accounts().len(), 1);
        assert!(profile
            .accounts_by_provider()
            .contains_key(&uri("urn:provider:y")));
        assert!(profile.directory().join(PROFILE_FILE).is_file());
        assert!(profile.directory().join(ACCOUNTS_DIR).is_dir());
        assert_eq!(events.drain(), vec![ProfileEvent::Created(profile.id())]);
    }

    #[test]
    fn display_names_are_unique() {
        let temp = tempdir().unwrap();
        let store = open(temp.path()).unwrap();
        let kim = store.create_profile(&uri("urn:provider:x"), "Kim").unwrap();
        let ana = store.create_profile(&uri("urn:provider:x"), "Ana").unwrap();

        let err = store.create_profile(&uri("urn:provider:x"), "Kim").unwrap_err();
        assert_eq!(
            err.invariant(),
            Some(&InvariantViolation::DisplayNameTaken("Kim".into()))
        );

        let err = store.set_display_name(ana.id(), "Kim").unwrap_err();
        assert!(matches!(
            err.invariant(),
            Some(InvariantViolation::DisplayNameTaken(_))
        ));

        store.set_display_name(kim.id(), "Kim").unwrap();
        store.set_display_name(kim.id(), "Jo").unwrap();
        assert_eq!(
            store.find_profile_with_display_name("Jo").unwrap().id(),
            kim.id()
        );
        assert!(store.find_profile_with_display_name("Kim").is_none());
        assert_eq!(store.profiles_by_display_name().len(), 2);
    }

    #[test]
    fn unknown_provider_leaves_nothing_behind() {
        let temp = tempdir().unwrap();
        let store = open(temp.path()).unwrap();

        let err = store
            .create_profile(&uri("urn:provider:nope"), "Kim")
            .unwrap_err();
        assert!(matches!(
            err.invariant(),
            Some(InvariantViolation::UnknownProvider(_))
        ));
        assert!(store.is_empty());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn delete_profile_rules() {
        let temp = tempdir().unwrap();
        let store = open(temp.path()).unwrap();
        let kim = store.create_profile(&uri("urn:provider:x"), "Kim").unwrap();

        let err = store.delete_profile(ProfileId::random()).unwrap_err();
        assert!(matches!(
            err.invariant(),
            Some(InvariantViolation::NoSuchProfile(_))
        ));
        let err = store.delete_profile(kim.id()).unwrap_err();
        assert_eq!(err.invariant(), Some(&InvariantViolation::LastProfile));

        let ana = store.create_profile(&uri("urn:provider:x"), "Ana").unwrap();
        store.set_current_profile(ana.id()).unwrap();
        store.delete_profile(ana.id()).unwrap();

        assert!(store.profile(ana.id()).is_none());
        assert!(store.current_profile().is_none());
        assert!(!ana.directory().exists());
    }

    #[test]
    fn current_profile_selection() {
        let temp = tempdir().unwrap();
        let store = open(temp.path()).unwrap();
        let kim = store.create_profile(&uri("urn:provider:x"), "Kim").unwrap();
        let events = store.subscribe();

        assert!(store.current_profile().is_none());
        store.set_current_profile(kim.id()).unwrap();
        assert_eq!(store.current_profile().unwrap().id(), kim.id());
        assert_eq!(events.drain(), vec![ProfileEvent::Selected(kim.id())]);

        let err = store.set_current_profile(ProfileId::random()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invariant);
    }

    #[test]
    fn reopen_restores_profiles_and_preferences() {
        let temp = tempdir().unwrap();
        let (id, account) = {
            let store = open(temp.path()).unwrap();
            let profile = store.create_profile(&uri("urn:provider:x"), "Kim").unwrap();
            let account = profile.create_account(&uri("urn:provider:y")).unwrap();
            profile.select_account(&uri("urn:provider:y")).unwrap();
            (profile.id(), account.id())
        };

        let store = open(temp.path()).unwrap();
        let profile = store.profile(id).unwrap();
        assert_eq!(profile.display_name(), "Kim");
        assert_eq!(profile.accounts().len(), 2);
        assert_eq!(profile.preferences().most_recent_account, Some(account));
        assert_eq!(profile.most_recent_account().unwrap().id(), account);
    }

    #[test]
    fn empty_account_store_gets_default_account() {
        let temp = tempdir().unwrap();
        let id = ProfileId::random();
        let directory = temp.path().join(id.to_string());
        fs::create_dir(&directory).unwrap();
        fs::write(directory.join(PROFILE_FILE), br#"{"displayName":"Kim"}"#).unwrap();

        let store = open(temp.path()).unwrap();
        let profile = store.profile(id).unwrap();
        assert_eq!(profile.accounts().len(), 1);
        assert!(profile
            .accounts_by_provider()
            .contains_key(&uri("urn:provider:x")));
    }

    #[test]
    fn most_recent_account_falls_back_to_first() {
        let temp = tempdir().unwrap();
        let store = open(temp.path()).unwrap();
        let profile = store.create_profile(&uri("urn:provider:x"), "Kim").unwrap();
        profile.create_account(&uri("urn:provider:y")).unwrap();

        let first = *profile.accounts().keys().next().unwrap();
        assert_eq!(profile.most_recent_account().unwrap().id(), first);

        let selected = profile.select_account(&uri("urn:provider:y")).unwrap();
        profile
            .delete_account_by_provider(&uri("urn:provider:y"))
            .unwrap();
        assert_eq!(profile.preferences().most_recent_account, None);
        assert_ne!(profile.most_recent_account().unwrap().id(), selected.id());

        let err = profile.select_account(&uri("urn:provider:y")).unwrap_err();
        assert!(matches!(
            err.invariant(),
            Some(InvariantViolation::NoSuchAccount(_))
        ));
    }

    #[test]
    fn anonymous_mode_keeps_a_single_profile() {
        let temp = tempdir().unwrap();
        let config = StoreConfig::default().anonymous(true);
        let id = {
            let store = ProfileStore::open(temp.path(), config.clone(), collaborators()).unwrap();
            let profile = store.current_profile().unwrap();
            assert_eq!(profile.display_name(), "");

            let err = store.create_profile(&uri("urn:provider:y"), "Kim").unwrap_err();
            assert_eq!(err.invariant(), Some(&InvariantViolation::AnonymousMode));
            let err = store.delete_profile(profile.id()).unwrap_err();
            assert_eq!(err.invariant(), Some(&InvariantViolation::AnonymousMode));
            profile.id()
        };

        let store = ProfileStore::open(temp.path(), config, collaborators()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.current_profile().unwrap().id(), id);
    }
}
