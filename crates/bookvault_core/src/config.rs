//! Store configuration.

use bookvault_storage::WriteOptions;
use std::time::Duration;

/// Configuration for opening profile and account stores.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long to wait for a description file's advisory lock.
    pub lock_timeout: Duration,

    /// How often to retry the advisory lock while waiting.
    pub lock_poll_interval: Duration,

    /// Whether to fsync description files and their directories.
    pub sync_writes: bool,

    /// How many random identifiers to try before giving up on a create.
    pub max_id_attempts: usize,

    /// Whether the profile store runs with a single anonymous profile.
    pub anonymous: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(1000),
            lock_poll_interval: Duration::from_millis(10),
            sync_writes: true,
            max_id_attempts: 100,
            anonymous: false,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the advisory lock timeout.
    #[must_use]
    pub const fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the advisory lock poll interval.
    #[must_use]
    pub const fn lock_poll_interval(mut self, interval: Duration) -> Self {
        self.lock_poll_interval = interval;
        self
    }

    /// Sets whether writes are synced to disk.
    #[must_use]
    pub const fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Sets the number of identifier attempts.
    #[must_use]
    pub const fn max_id_attempts(mut self, attempts: usize) -> Self {
        self.max_id_attempts = attempts;
        self
    }

    /// Enables or disables anonymous profile mode.
    #[must_use]
    pub const fn anonymous(mut self, value: bool) -> Self {
        self.anonymous = value;
        self
    }

    /// Returns the options used for atomic description writes.
    #[must_use]
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            lock_timeout: self.lock_timeout,
            poll_interval: self.lock_poll_interval,
            sync: self.sync_writes,
        }
    }
}
