//! Test fixtures and store helpers.
//!
//! Provides a temporary directory wired to in-memory collaborators, plus
//! helpers for planting on-disk layouts the stores are expected to cope
//! with.

use bookvault_core::account::ACCOUNT_FILE;
use bookvault_core::collab::{
    BookDatabaseFactory, Collaborators, CredentialsStore, DirectoryBookDatabaseFactory,
    MemoryCredentialsStore, Provider, ProviderAuthentication, ProviderCollection,
    StaticProviderCollection,
};
use bookvault_core::profile::PROFILE_FILE;
use bookvault_core::{AccountStore, ProfileId, ProfileStore, ProviderUri, StoreConfig, StoreResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// The default provider of [`test_providers`].
pub const PROVIDER_X: &str = "urn:provider:x";

/// A second provider without authentication.
pub const PROVIDER_Y: &str = "urn:provider:y";

/// A provider requiring a username and password.
pub const PROVIDER_AUTH: &str = "urn:provider:auth";

/// Returns [`PROVIDER_X`] as a URI.
pub fn provider_x() -> ProviderUri {
    ProviderUri::parse(PROVIDER_X).expect("valid provider uri")
}

/// Returns [`PROVIDER_Y`] as a URI.
pub fn provider_y() -> ProviderUri {
    ProviderUri::parse(PROVIDER_Y).expect("valid provider uri")
}

/// Returns [`PROVIDER_AUTH`] as a URI.
pub fn provider_auth() -> ProviderUri {
    ProviderUri::parse(PROVIDER_AUTH).expect("valid provider uri")
}

/// The providers every fixture knows about.
pub fn test_providers() -> StaticProviderCollection {
    StaticProviderCollection::new(
        Provider::new(provider_x(), "Provider X"),
        [
            Provider::new(provider_y(), "Provider Y"),
            Provider::new(provider_auth(), "Authenticated Provider").with_authentication(
                ProviderAuthentication::Basic {
                    login_label: Some("Card number".into()),
                    password_label: Some("PIN".into()),
                },
            ),
        ],
    )
}

/// Store configuration for tests: short lock timeout, no fsync.
pub fn test_config() -> StoreConfig {
    StoreConfig::new()
        .lock_timeout(Duration::from_millis(200))
        .lock_poll_interval(Duration::from_millis(5))
        .sync_writes(false)
}

/// A temporary store root with collaborators.
///
/// The directory is removed when the environment is dropped.
pub struct TestEnvironment {
    temp_dir: TempDir,
    /// Identity used for account stores opened directly.
    pub profile: ProfileId,
    /// Store configuration.
    pub config: StoreConfig,
    /// Provider collection.
    pub providers: Arc<StaticProviderCollection>,
    /// The in-memory credentials store, used unless replaced.
    pub credentials: Arc<MemoryCredentialsStore>,
    credentials_override: Option<Arc<dyn CredentialsStore>>,
    book_databases: Arc<dyn BookDatabaseFactory>,
}

impl TestEnvironment {
    /// Creates an environment in a fresh temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            profile: ProfileId::random(),
            config: test_config(),
            providers: Arc::new(test_providers()),
            credentials: Arc::new(MemoryCredentialsStore::new()),
            credentials_override: None,
            book_databases: Arc::new(DirectoryBookDatabaseFactory),
        }
    }

    /// Replaces the store configuration.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the credentials store.
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialsStore>) -> Self {
        self.credentials_override = Some(credentials);
        self
    }

    /// Replaces the book database factory.
    pub fn with_book_databases(mut self, factory: Arc<dyn BookDatabaseFactory>) -> Self {
        self.book_databases = factory;
        self
    }

    /// The temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Root used by [`open_account_store`](Self::open_account_store).
    pub fn accounts_root(&self) -> PathBuf {
        self.path().join("accounts")
    }

    /// Root used by [`open_profile_store`](Self::open_profile_store).
    pub fn profiles_root(&self) -> PathBuf {
        self.path().join("profiles")
    }

    /// The collaborators handed to stores.
    pub fn collaborators(&self) -> Collaborators {
        let credentials: Arc<dyn CredentialsStore> = match &self.credentials_override {
            Some(credentials) => Arc::clone(credentials),
            None => Arc::clone(&self.credentials) as Arc<dyn CredentialsStore>,
        };
        Collaborators::new(
            Arc::clone(&self.providers) as Arc<dyn ProviderCollection>,
            credentials,
            Arc::clone(&self.book_databases),
        )
    }

    /// Opens the account store at [`accounts_root`](Self::accounts_root).
    pub fn try_open_account_store(&self) -> StoreResult<AccountStore> {
        AccountStore::open(
            self.profile,
            &self.accounts_root(),
            self.config.clone(),
            self.collaborators(),
            Arc::default(),
        )
    }

    /// Opens the account store, panicking on failure.
    pub fn open_account_store(&self) -> AccountStore {
        self.try_open_account_store()
            .expect("Failed to open account store")
    }

    /// Opens the profile store at [`profiles_root`](Self::profiles_root).
    pub fn try_open_profile_store(&self) -> StoreResult<ProfileStore> {
        ProfileStore::open(&self.profiles_root(), self.config.clone(), self.collaborators())
    }

    /// Opens the profile store, panicking on failure.
    pub fn open_profile_store(&self) -> ProfileStore {
        self.try_open_profile_store()
            .expect("Failed to open profile store")
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes an account directory named `name` under `root` with the given
/// `account.json` contents, as an older version or another process would.
pub fn plant_account(root: &Path, name: &str, description: &str) -> PathBuf {
    let directory = root.join(name);
    fs::create_dir_all(&directory).expect("Failed to create account directory");
    fs::write(directory.join(ACCOUNT_FILE), description).expect("Failed to write account.json");
    directory
}

/// Writes a valid `account.json` for `provider` into a directory named
/// `name`.
pub fn plant_account_for(root: &Path, name: &str, provider: &ProviderUri) -> PathBuf {
    plant_account(root, name, &format!(r#"{{"provider":"{provider}"}}"#))
}

/// Writes a profile directory named `name` under `root` with the given
/// display name and no accounts.
pub fn plant_profile(root: &Path, name: &str, display_name: &str) -> PathBuf {
    let directory = root.join(name);
    fs::create_dir_all(&directory).expect("Failed to create profile directory");
    fs::write(
        directory.join(PROFILE_FILE),
        format!(r#"{{"displayName":"{display_name}"}}"#),
    )
    .expect("Failed to write profile.json");
    directory
}

/// Lists the directory names under `root`, sorted.
pub fn directory_names(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(root)
        .expect("Failed to read directory")
        .filter_map(|entry| {
            let entry = entry.ok()?;
            entry
                .file_type()
                .ok()?
                .is_dir()
                .then(|| entry.file_name().to_string_lossy().into_owned())
        })
        .collect();
    names.sort();
    names
}
