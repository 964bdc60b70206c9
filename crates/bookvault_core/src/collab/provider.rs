//! Content providers.

use crate::id::ProviderUri;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// How a provider authenticates patrons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderAuthentication {
    /// Username and password (or barcode and PIN).
    Basic {
        /// Label shown for the username field.
        login_label: Option<String>,
        /// Label shown for the password field.
        password_label: Option<String>,
    },
    /// OAuth through an intermediary page.
    OAuthWithIntermediary {
        /// Where the authentication flow starts.
        authenticate: ProviderUri,
    },
}

/// A remote content source, as described by the catalog layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    /// Unique identifier of the provider.
    pub id: ProviderUri,
    /// Human-readable name.
    pub display_name: String,
    /// Authentication scheme; `None` for providers that need no login.
    pub authentication: Option<ProviderAuthentication>,
    /// Root catalog feed.
    pub catalog: Option<ProviderUri>,
}

impl Provider {
    /// Creates a provider that requires no authentication.
    #[must_use]
    pub fn new(id: ProviderUri, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            authentication: None,
            catalog: None,
        }
    }

    /// Sets the authentication scheme.
    #[must_use]
    pub fn with_authentication(mut self, authentication: ProviderAuthentication) -> Self {
        self.authentication = Some(authentication);
        self
    }

    /// Returns true if patrons must log in to borrow from this provider.
    #[must_use]
    pub fn requires_authentication(&self) -> bool {
        self.authentication.is_some()
    }
}

/// The set of providers known to the application.
pub trait ProviderCollection: Send + Sync {
    /// Looks up a provider by id.
    fn lookup(&self, id: &ProviderUri) -> Option<Arc<Provider>>;

    /// The provider used for automatically created accounts.
    fn default_provider(&self) -> Arc<Provider>;

    /// All known providers.
    fn providers(&self) -> Vec<Arc<Provider>>;
}

/// A fixed, in-memory provider collection.
#[derive(Debug, Clone)]
pub struct StaticProviderCollection {
    default: Arc<Provider>,
    providers: BTreeMap<ProviderUri, Arc<Provider>>,
}

impl StaticProviderCollection {
    /// Creates a collection containing `default` and `others`.
    pub fn new(default: Provider, others: impl IntoIterator<Item = Provider>) -> Self {
        let default = Arc::new(default);
        let mut providers = BTreeMap::new();
        providers.insert(default.id.clone(), Arc::clone(&default));
        for provider in others {
            providers.insert(provider.id.clone(), Arc::new(provider));
        }
        Self { default, providers }
    }
}

impl ProviderCollection for StaticProviderCollection {
    fn lookup(&self, id: &ProviderUri) -> Option<Arc<Provider>> {
        self.providers.get(id).cloned()
    }

    fn default_provider(&self) -> Arc<Provider> {
        Arc::clone(&self.default)
    }

    fn providers(&self) -> Vec<Arc<Provider>> {
        self.providers.values().cloned().collect()
    }
}
