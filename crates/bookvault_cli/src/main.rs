//! bookvault CLI
//!
//! Command-line tools for bookvault profile directories.
//!
//! # Commands
//!
//! - `inspect` - List profiles and accounts found on disk
//! - `verify` - Check every description without modifying anything
//! - `migrate` - Rename legacy profile and account directories to UUIDs

mod commands;
mod error;
mod layout;

use clap::{Parser, Subcommand, ValueEnum};
use error::CliError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// bookvault command-line maintenance tools.
#[derive(Parser)]
#[command(name = "bookvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the profiles directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for `inspect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human readable
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List profiles and accounts found on disk
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Check every description without modifying anything
    Verify,

    /// Rename legacy profile and account directories to UUIDs
    Migrate {
        /// Show what would be renamed without renaming
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or(CliError::MissingPath("inspect"))?;
            commands::inspect::run(&path, format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or(CliError::MissingPath("verify"))?;
            commands::verify::run(&path)?;
        }
        Commands::Migrate { dry_run } => {
            let path = cli.path.ok_or(CliError::MissingPath("migrate"))?;
            commands::migrate::run(&path, dry_run)?;
        }
        Commands::Version => {
            println!("bookvault CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("bookvault core v{}", bookvault_core::VERSION);
        }
    }

    Ok(())
}
