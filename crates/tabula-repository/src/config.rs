//! Repository configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-repository behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Re-read the matched row right before `update`/`delete` and fail with
    /// `ConcurrentModification` if it changed since the scan
    pub verify_before_write: bool,
    /// How long a resolved table id stays cached
    pub table_id_ttl_secs: u64,
}

impl RepositoryConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With lost-update detection on or off
    #[inline]
    #[must_use]
    pub fn with_verify_before_write(mut self, verify: bool) -> Self {
        self.verify_before_write = verify;
        self
    }

    /// With table id cache lifetime
    #[inline]
    #[must_use]
    pub fn with_table_id_ttl(mut self, ttl: Duration) -> Self {
        self.table_id_ttl_secs = ttl.as_secs();
        self
    }

    /// Table id cache lifetime
    #[inline]
    #[must_use]
    pub fn table_id_ttl(&self) -> Duration {
        Duration::from_secs(self.table_id_ttl_secs)
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            verify_before_write: false,
            table_id_ttl_secs: 3_600,
        }
    }
}
