//! Collaborators consumed by the stores.
//!
//! Stores never talk to the network or to DRM libraries themselves; they go
//! through these narrow interfaces, which the application wires up once at
//! startup and passes in explicitly.

mod book_database;
mod credentials;
mod provider;

pub use book_database::{
    BookDatabase, BookDatabaseFactory, DirectoryBookDatabase, DirectoryBookDatabaseFactory,
};
pub use credentials::{
    AccountCredentials, CredentialsStore, FileCredentialsStore, MemoryCredentialsStore,
};
pub use provider::{Provider, ProviderAuthentication, ProviderCollection, StaticProviderCollection};

use std::sync::Arc;

/// The collaborators a store needs, bundled for passing around.
#[derive(Clone)]
pub struct Collaborators {
    /// Known content providers.
    pub providers: Arc<dyn ProviderCollection>,
    /// Where account credentials live.
    pub credentials: Arc<dyn CredentialsStore>,
    /// Opens per-account book databases.
    pub book_databases: Arc<dyn BookDatabaseFactory>,
}

impl Collaborators {
    /// Bundles collaborators.
    pub fn new(
        providers: Arc<dyn ProviderCollection>,
        credentials: Arc<dyn CredentialsStore>,
        book_databases: Arc<dyn BookDatabaseFactory>,
    ) -> Self {
        Self {
            providers,
            credentials,
            book_databases,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
