//! Directory layout shared by the profile and account stores.
//!
//! Both stores look the same on disk:
//!
//! ```text
//! <root>/
//! └─ <uuid>/
//!    ├─ <kind>.json       # Description, replaced atomically
//!    ├─ <kind>.json.tmp   # Transient
//!    └─ lock              # Advisory lock guarding the description
//! ```

use crate::config::StoreConfig;
use crate::error::{InvariantViolation, StoreError, StoreResult};
use bookvault_storage::{resolve_or_migrate, AtomicFile};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// An entity directory found while scanning a store root.
#[derive(Debug, Clone)]
pub(crate) struct ScannedEntry {
    pub id: Uuid,
    pub directory: PathBuf,
}

/// Creates `root` if absent and checks that it is a directory.
pub(crate) fn prepare_root(root: &Path) -> StoreResult<()> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(StoreError::Structural {
            path: root.to_path_buf(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            fs::create_dir_all(root).map_err(|e| StoreError::io(root, e))
        }
        Err(e) => Err(StoreError::io(root, e)),
    }
}

/// Lists the entity directories under `root`, in name order.
///
/// Legacy names are migrated to UUIDs. An entry that cannot be migrated is
/// logged and left out; it is not deleted and will be retried next time.
pub(crate) fn scan_entries(root: &Path) -> StoreResult<Vec<ScannedEntry>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| StoreError::io(root, e))? {
        let entry = entry.map_err(|e| StoreError::io(root, e))?;
        let file_type = entry.file_type().map_err(|e| StoreError::io(entry.path(), e))?;
        if !file_type.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => warn!(root = %root.display(), ?name, "skipping directory with non UTF-8 name"),
        }
    }
    names.sort();

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        match resolve_or_migrate(root, &name) {
            Ok(id) => entries.push(ScannedEntry {
                id,
                directory: root.join(id.to_string()),
            }),
            Err(e) => warn!(root = %root.display(), name = %name, error = %e, "skipping entry that could not be migrated"),
        }
    }
    Ok(entries)
}

/// Picks a random id not yet taken, and not present as a directory in `root`.
pub(crate) fn fresh_id(root: &Path, attempts: usize, taken: impl Fn(Uuid) -> bool) -> StoreResult<Uuid> {
    for _ in 0..attempts {
        let id = Uuid::new_v4();
        if !taken(id) && !root.join(id.to_string()).exists() {
            return Ok(id);
        }
    }
    Err(InvariantViolation::IdExhausted { attempts }.into())
}

/// Returns the atomic file for the description `name` in `directory`.
pub(crate) fn description_file(directory: &Path, name: &str, config: &StoreConfig) -> AtomicFile {
    AtomicFile::for_target(&directory.join(name)).with_options(config.write_options())
}

/// Loads and parses a description file.
pub(crate) fn load_description<T: DeserializeOwned>(file: &AtomicFile) -> StoreResult<T> {
    let path = file.target();
    let data = file
        .read()?
        .ok_or_else(|| StoreError::parse(path, "description file is missing"))?;
    serde_json::from_slice(&data).map_err(|e| StoreError::json(path, e))
}

/// Serializes and atomically writes a description file.
pub(crate) fn save_description<T: Serialize>(file: &AtomicFile, value: &T) -> StoreResult<()> {
    let data = serde_json::to_vec_pretty(value).map_err(|e| StoreError::json(file.target(), e))?;
    file.write(&data)?;
    Ok(())
}

/// Recursively deletes `path`. A missing directory is not an error.
pub(crate) fn remove_directory(path: &Path) -> StoreResult<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed directory");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}
