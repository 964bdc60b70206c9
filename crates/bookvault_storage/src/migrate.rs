//! Directory identity resolution.
//!
//! Entity directories are named after their UUID. Older layouts used plain
//! integers (`0`, `1`, `42`, ...); those are renamed to a fresh UUID the
//! first time they are encountered.

use crate::error::MigrationError;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Maximum number of fresh names tried before giving up on a migration.
pub const MAX_MIGRATION_ATTEMPTS: usize = 100;

/// Returns the id a directory name stands for, if the name is already in
/// canonical form (lowercase, hyphenated).
///
/// Other spellings `Uuid::parse_str` accepts (uppercase, simple, braced,
/// `urn:uuid:`) are not canonical: the stores address directories by
/// `id.to_string()`, so those names must be migrated like any legacy name.
pub fn canonical_id(name: &str) -> Option<Uuid> {
    Uuid::parse_str(name)
        .ok()
        .filter(|id| id.hyphenated().to_string() == name)
}

/// Resolves the identifier of `parent/name`, migrating legacy names.
///
/// If `name` is a canonical UUID it is returned unchanged. Otherwise a random
/// UUID is generated and the directory is renamed to it, retrying on name
/// collisions up to [`MAX_MIGRATION_ATTEMPTS`] times.
///
/// # Errors
///
/// Returns a [`MigrationError`] if the rename fails or no free name was
/// found. Nothing is deleted in that case; the caller should skip the entry.
pub fn resolve_or_migrate(parent: &Path, name: &str) -> Result<Uuid, MigrationError> {
    resolve_or_migrate_with(parent, name, Uuid::new_v4)
}

/// Like [`resolve_or_migrate`], drawing candidate names from `generate`.
pub fn resolve_or_migrate_with<F>(parent: &Path, name: &str, mut generate: F) -> Result<Uuid, MigrationError>
where
    F: FnMut() -> Uuid,
{
    if let Some(id) = canonical_id(name) {
        return Ok(id);
    }

    let from = parent.join(name);
    for _ in 0..MAX_MIGRATION_ATTEMPTS {
        let id = generate();
        let to = parent.join(id.to_string());

        // rename(2) silently replaces an empty directory, so check first.
        if to.exists() {
            continue;
        }

        match fs::rename(&from, &to) {
            Ok(()) => {
                info!(from = %from.display(), to = %to.display(), "migrated legacy directory");
                return Ok(id);
            }
            Err(e) if matches!(e.kind(), ErrorKind::AlreadyExists | ErrorKind::DirectoryNotEmpty) => {
                continue;
            }
            Err(source) => {
                warn!(from = %from.display(), error = %source, "could not migrate legacy directory");
                return Err(MigrationError::Io { from, to, source });
            }
        }
    }

    warn!(from = %from.display(), "ran out of names migrating legacy directory");
    Err(MigrationError::CollisionsExhausted {
        from,
        attempts: MAX_MIGRATION_ATTEMPTS,
    })
}
