//! Verify command implementation.

use crate::error::CliError;
use crate::layout::{self, ProfileEntry};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of profiles checked.
    pub profiles_checked: usize,
    /// Number of accounts checked.
    pub accounts_checked: usize,
    /// Directories that still carry a legacy name.
    pub legacy_names: Vec<String>,
    /// Conditions the store repairs on open.
    pub notes: Vec<String>,
    /// Problems that would stop the store from opening cleanly.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), CliError> {
    println!("Verifying profiles at {}", path.display());
    println!();

    let result = verify(&layout::scan(path)?);

    println!("  Profiles checked: {}", result.profiles_checked);
    println!("  Accounts checked: {}", result.accounts_checked);
    if !result.legacy_names.is_empty() {
        println!("  Legacy names (run `migrate`):");
        for name in &result.legacy_names {
            println!("    - {name}");
        }
    }
    for note in &result.notes {
        println!("  Note: {note}");
    }
    for error in &result.errors {
        println!("  Error: {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Profile verification passed");
        Ok(())
    } else {
        println!("✗ Profile verification failed");
        Err(CliError::VerificationFailed(result.errors.len()))
    }
}

fn verify(profiles: &[ProfileEntry]) -> VerifyResult {
    let mut result = VerifyResult {
        profiles_checked: profiles.len(),
        ..VerifyResult::default()
    };
    let mut display_names: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for profile in profiles {
        if profile.id.is_none() {
            result.legacy_names.push(profile.path.display().to_string());
        }
        match (&profile.description, &profile.error) {
            (Some(d), _) => display_names
                .entry(d.display_name.as_str())
                .or_default()
                .push(profile.name.as_str()),
            (None, Some(error)) => result.errors.push(error.clone()),
            (None, None) => {}
        }
        if profile.accounts.is_empty() {
            result.notes.push(format!(
                "profile {} has no accounts; one is created for the default provider on open",
                profile.name
            ));
        }

        let mut providers = BTreeSet::new();
        for account in &profile.accounts {
            result.accounts_checked += 1;
            if account.id.is_none() {
                result.legacy_names.push(account.path.display().to_string());
            }
            match (&account.description, &account.error) {
                (Some(d), _) => {
                    if !providers.insert(&d.provider) {
                        result.errors.push(format!(
                            "profile {} has more than one account for {}",
                            profile.name, d.provider
                        ));
                    }
                }
                (None, Some(error)) => result.errors.push(error.clone()),
                (None, None) => {}
            }
        }
    }

    for (name, owners) in display_names {
        if owners.len() > 1 {
            result.errors.push(format!(
                "display name {name:?} is used by {}",
                owners.join(", ")
            ));
        }
    }
    result
}
