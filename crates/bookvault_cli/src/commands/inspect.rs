//! Inspect command implementation.

use crate::error::CliError;
use crate::layout::{self, ProfileEntry};
use crate::Format;
use serde::Serialize;
use std::path::Path;

/// Inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Profiles directory.
    pub path: String,
    /// Number of profiles.
    pub profile_count: usize,
    /// Number of accounts across all profiles.
    pub account_count: usize,
    /// Profiles found on disk.
    pub profiles: Vec<ProfileEntry>,
}

impl InspectResult {
    fn new(path: &Path, profiles: Vec<ProfileEntry>) -> Self {
        Self {
            path: path.display().to_string(),
            profile_count: profiles.len(),
            account_count: profiles.iter().map(|p| p.accounts.len()).sum(),
            profiles,
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, format: Format) -> Result<(), CliError> {
    let result = InspectResult::new(path, layout::scan(path)?);
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print_text(&result),
    }
    Ok(())
}

fn print_text(result: &InspectResult) {
    println!("Profiles directory: {}", result.path);
    println!("  {} profile(s), {} account(s)", result.profile_count, result.account_count);
    println!();

    for profile in &result.profiles {
        let name = profile
            .description
            .as_ref()
            .map_or("<unreadable>", |d| d.display_name.as_str());
        let legacy = if profile.id.is_none() { " (legacy name)" } else { "" };
        println!("Profile {}{legacy}", profile.name);
        println!("  Display name: {name:?}");
        if let Some(error) = &profile.error {
            println!("  Error: {error}");
        }

        for account in &profile.accounts {
            let legacy = if account.id.is_none() { " (legacy name)" } else { "" };
            match &account.description {
                Some(d) => println!("  Account {}{legacy}: {}", account.name, d.provider),
                None => println!("  Account {}{legacy}: <unreadable>", account.name),
            }
            if let Some(error) = &account.error {
                println!("    Error: {error}");
            }
        }
        println!();
    }
}
