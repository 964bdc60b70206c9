//! Crash simulation for description files.
//!
//! An atomic write has two steps: the temporary file is written and synced,
//! then renamed over the target. These helpers stop a write at a chosen
//! point, leaving the files exactly as a crash there would.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bookvault_testkit::crash::{write_until, CrashPoint};
//!
//! write_until(&account_json, b"{\"provider\":", CrashPoint::BeforeRename)?;
//! // account.json still holds the previous description.
//! ```

use bookvault_storage::{AtomicFile, StorageError, StorageResult, WriteOptions};
use std::fs;
use std::path::Path;

/// Points at which a write can be interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashPoint {
    /// The temporary file was only partly written.
    DuringTempWrite,
    /// The temporary file is complete but was never renamed.
    BeforeRename,
    /// The write completed.
    AfterRename,
}

impl CrashPoint {
    /// Every crash point, in the order a write passes them.
    pub const ALL: [Self; 3] = [Self::DuringTempWrite, Self::BeforeRename, Self::AfterRename];
}

fn atomic_file(target: &Path) -> AtomicFile {
    AtomicFile::for_target(target).with_options(WriteOptions {
        sync: false,
        ..WriteOptions::default()
    })
}

/// Writes `bytes` to `target` atomically, stopping at `point`.
pub fn write_until(target: &Path, bytes: &[u8], point: CrashPoint) -> StorageResult<()> {
    let file = atomic_file(target);
    match point {
        CrashPoint::DuringTempWrite => {
            let half = &bytes[..bytes.len() / 2];
            fs::write(file.temp(), half)
                .map_err(|e| StorageError::io(file.temp(), e))
        }
        CrashPoint::BeforeRename => {
            let staged = file.stage(bytes)?;
            drop(staged);
            Ok(())
        }
        CrashPoint::AfterRename => file.write(bytes),
    }
}

/// Writes `bytes` as the temporary file of `target` and never commits.
pub fn interrupt_write(target: &Path, bytes: &[u8]) -> StorageResult<()> {
    write_until(target, bytes, CrashPoint::BeforeRename)
}

/// Returns true if a leftover temporary file exists next to `target`.
pub fn has_leftover_temp(target: &Path) -> bool {
    atomic_file(target).temp().exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn target_survives_every_crash_point() {
        for point in CrashPoint::ALL {
            let temp = tempdir().unwrap();
            let target = temp.path().join("account.json");
            fs::write(&target, b"old").unwrap();

            write_until(&target, b"new contents", point).unwrap();

            let contents = fs::read(&target).unwrap();
            match point {
                CrashPoint::AfterRename => assert_eq!(contents, b"new contents"),
                CrashPoint::DuringTempWrite | CrashPoint::BeforeRename => {
                    assert_eq!(contents, b"old");
                    assert!(has_leftover_temp(&target));
                }
            }
        }
    }
}
