//! # bookvault core
//!
//! Profiles, accounts and book status tracking for bookvault.
//!
//! This crate provides:
//! - [`ProfileStore`]: every profile on the device, persisted as a directory
//!   of JSON descriptions
//! - [`AccountStore`]: the accounts of one profile, at most one per provider
//! - [`BookStatusRegistry`]: the live status of every tracked book, with
//!   priority-based resolution of racing updates
//! - [`events`]: in-process publish/subscribe used by all of the above
//!
//! Network access, DRM and catalog parsing stay outside; the stores reach
//! them through the traits in [`collab`].
//!
//! ## On-disk layout
//!
//! ```text
//! <profiles root>/
//! └─ <profileId>/
//!    ├─ profile.json
//!    ├─ lock
//!    └─ accounts/
//!       └─ <accountId>/
//!          ├─ account.json
//!          ├─ lock
//!          └─ books/
//! ```
//!
//! ## Example
//!
//! ```rust
//! use bookvault_core::collab::{
//!     Collaborators, DirectoryBookDatabaseFactory, MemoryCredentialsStore, Provider,
//!     StaticProviderCollection,
//! };
//! use bookvault_core::{ProfileStore, ProviderUri, StoreConfig};
//! use std::sync::Arc;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let library = ProviderUri::parse("urn:provider:library").unwrap();
//! let collaborators = Collaborators::new(
//!     Arc::new(StaticProviderCollection::new(Provider::new(library.clone(), "Library"), [])),
//!     Arc::new(MemoryCredentialsStore::new()),
//!     Arc::new(DirectoryBookDatabaseFactory),
//! );
//!
//! let store = ProfileStore::open(dir.path(), StoreConfig::default(), collaborators).unwrap();
//! let profile = store.create_profile(&library, "Kim").unwrap();
//! assert_eq!(profile.accounts().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod account;
pub mod book;
pub mod collab;
mod config;
mod error;
pub mod events;
mod id;
mod persist;
pub mod profile;
pub mod registry;

pub use account::{Account, AccountLoginState, AccountStore};
pub use book::{Book, BookStatus, BookWithStatus};
pub use config::StoreConfig;
pub use error::{
    BookDatabaseError, CredentialsError, ErrorKind, InvariantViolation, StoreError,
    StoreResult,
};
pub use id::{AccountId, BookId, ProfileId, ProviderUri};
pub use profile::{Profile, ProfileStore};
pub use registry::BookStatusRegistry;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
