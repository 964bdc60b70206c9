//! # bookvault storage
//!
//! Crash-safe file persistence primitives for bookvault.
//!
//! This crate is the lowest layer of the workspace. It knows nothing about
//! profiles, accounts or books; it only knows how to:
//!
//! - Replace a file atomically under an advisory lock ([`AtomicFile`])
//! - Hold an exclusive advisory lock with a bounded wait ([`FileLock`])
//! - Resolve a directory name to a UUID, migrating legacy names
//!   ([`resolve_or_migrate`])
//!
//! ## Example
//!
//! ```rust
//! use bookvault_storage::AtomicFile;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let file = AtomicFile::for_target(&dir.path().join("profile.json"));
//! file.write(br#"{"displayName":"Kim"}"#).unwrap();
//! assert!(file.read().unwrap().is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod atomic;
mod error;
mod lock;
mod migrate;

pub use atomic::{
    sync_directory, write_atomically, AtomicFile, StagedWrite, WriteOptions, LOCK_FILE, TEMP_SUFFIX,
};
pub use error::{MigrationError, StorageError, StorageResult};
pub use lock::FileLock;
pub use migrate::{canonical_id, resolve_or_migrate, resolve_or_migrate_with, MAX_MIGRATION_ATTEMPTS};
