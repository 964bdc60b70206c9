//! Read-only view of a profiles directory.
//!
//! The commands look at the raw files instead of opening the stores, which
//! would migrate directories, create default accounts and delete duplicates.

use crate::error::CliError;
use bookvault_core::account::{AccountDescription, ACCOUNT_FILE};
use bookvault_core::profile::{ProfileDescription, ACCOUNTS_DIR, PROFILE_FILE};
use bookvault_storage::canonical_id;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// A profile directory as found on disk.
#[derive(Debug, Serialize)]
pub struct ProfileEntry {
    /// Directory name.
    pub name: String,
    /// Full path.
    pub path: PathBuf,
    /// The id, if the name is a canonical UUID.
    pub id: Option<Uuid>,
    /// The parsed `profile.json`.
    pub description: Option<ProfileDescription>,
    /// Why `profile.json` could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Accounts of the profile.
    pub accounts: Vec<AccountEntry>,
}

/// An account directory as found on disk.
#[derive(Debug, Serialize)]
pub struct AccountEntry {
    /// Directory name.
    pub name: String,
    /// Full path.
    pub path: PathBuf,
    /// The id, if the name is a canonical UUID.
    pub id: Option<Uuid>,
    /// The parsed `account.json`.
    pub description: Option<AccountDescription>,
    /// Why `account.json` could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reads every profile and account under `root`.
pub fn scan(root: &Path) -> Result<Vec<ProfileEntry>, CliError> {
    if !root.is_dir() {
        return Err(CliError::NotADirectory(root.to_path_buf()));
    }

    let mut profiles = Vec::new();
    for (name, path) in subdirectories(root)? {
        let (description, error) = read_description::<ProfileDescription>(&path.join(PROFILE_FILE));
        let accounts_root = path.join(ACCOUNTS_DIR);
        let accounts = if accounts_root.is_dir() {
            subdirectories(&accounts_root)?
                .into_iter()
                .map(|(name, path)| {
                    let (description, error) =
                        read_description::<AccountDescription>(&path.join(ACCOUNT_FILE));
                    AccountEntry {
                        id: canonical_id(&name),
                        name,
                        path,
                        description,
                        error,
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        profiles.push(ProfileEntry {
            id: canonical_id(&name),
            name,
            path,
            description,
            error,
            accounts,
        });
    }
    debug!(root = %root.display(), profiles = profiles.len(), "scanned profiles directory");
    Ok(profiles)
}

/// Lists subdirectories of `dir` by name, sorted.
pub fn subdirectories(dir: &Path) -> Result<Vec<(String, PathBuf)>, CliError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| CliError::io(dir, e))? {
        let entry = entry.map_err(|e| CliError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| CliError::io(entry.path(), e))?;
        if !file_type.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => entries.push((name, entry.path())),
            Err(name) => warn!(dir = %dir.display(), ?name, "skipping directory with non UTF-8 name"),
        }
    }
    entries.sort();
    Ok(entries)
}

fn read_description<T: DeserializeOwned>(path: &Path) -> (Option<T>, Option<String>) {
    match fs::read(path) {
        Ok(data) => match serde_json::from_slice(&data) {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(format!("{}: {e}", path.display()))),
        },
        Err(e) => (None, Some(format!("{}: {e}", path.display()))),
    }
}
