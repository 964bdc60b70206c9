//! Migrate command implementation.
//!
//! Renames legacy profile and account directories the same way the stores
//! do when they open, without loading any descriptions.

use crate::error::CliError;
use crate::layout;
use bookvault_core::profile::ACCOUNTS_DIR;
use bookvault_storage::{canonical_id, resolve_or_migrate, MigrationError};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Migration result.
#[derive(Debug, Default)]
pub struct MigrateResult {
    /// Directories renamed, as `(from, to)`.
    pub renamed: Vec<(PathBuf, PathBuf)>,
    /// Directories that could not be renamed.
    pub failures: Vec<MigrationError>,
}

/// Runs the migrate command.
pub fn run(path: &Path, dry_run: bool) -> Result<(), CliError> {
    if !path.is_dir() {
        return Err(CliError::NotADirectory(path.to_path_buf()));
    }

    if dry_run {
        let pending = pending(path)?;
        println!("Dry run: {} directory(ies) would be renamed", pending.len());
        for dir in pending {
            println!("  {}", dir.display());
        }
        return Ok(());
    }

    let result = migrate(path)?;
    for (from, to) in &result.renamed {
        println!("  {} -> {}", from.display(), to.display());
    }
    info!(
        renamed = result.renamed.len(),
        failed = result.failures.len(),
        "migration finished"
    );

    if result.failures.is_empty() {
        println!("✓ Migrated {} directory(ies)", result.renamed.len());
        Ok(())
    } else {
        for failure in &result.failures {
            println!("  Error: {failure}");
        }
        println!("✗ Migration incomplete");
        Err(CliError::MigrationFailed(result.failures))
    }
}

fn pending(root: &Path) -> Result<Vec<PathBuf>, CliError> {
    let mut pending = Vec::new();
    for (name, path) in layout::subdirectories(root)? {
        if canonical_id(&name).is_none() {
            pending.push(path.clone());
        }
        let accounts = path.join(ACCOUNTS_DIR);
        if accounts.is_dir() {
            for (name, path) in layout::subdirectories(&accounts)? {
                if canonical_id(&name).is_none() {
                    pending.push(path);
                }
            }
        }
    }
    Ok(pending)
}

fn migrate(root: &Path) -> Result<MigrateResult, CliError> {
    let mut result = MigrateResult::default();
    for (name, path) in layout::subdirectories(root)? {
        let profile_dir = match migrate_one(root, &name, &mut result) {
            Some(id) => root.join(id.to_string()),
            None => path,
        };

        let accounts = profile_dir.join(ACCOUNTS_DIR);
        if accounts.is_dir() {
            for (name, _) in layout::subdirectories(&accounts)? {
                migrate_one(&accounts, &name, &mut result);
            }
        }
    }
    Ok(result)
}

fn migrate_one(parent: &Path, name: &str, result: &mut MigrateResult) -> Option<Uuid> {
    match resolve_or_migrate(parent, name) {
        Ok(id) => {
            if id.to_string() != name {
                result
                    .renamed
                    .push((parent.join(name), parent.join(id.to_string())));
            }
            Some(id)
        }
        Err(e) => {
            result.failures.push(e);
            None
        }
    }
}
