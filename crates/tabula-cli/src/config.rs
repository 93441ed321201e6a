//! Application configuration: one TOML file, environment overrides on top

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tabula_lifecycle::LifecycleConfig;
use tabula_repository::RepositoryConfig;
use tabula_scheduler::SchedulerConfig;
use tabula_sheets::SheetsConfig;

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "tabula.toml";

/// Environment variable overriding `sheets.spreadsheet_id`
pub const SPREADSHEET_ID_ENV: &str = "TABULA_SPREADSHEET_ID";

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub filter: String,
    /// One JSON object per line instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Everything the binary needs
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Spreadsheet and credentials
    pub sheets: SheetsConfig,
    /// Backoff and rate-limit detection
    pub scheduler: SchedulerConfig,
    /// Write verification and table id caching
    pub repository: RepositoryConfig,
    /// Accepted uploads and notifications
    pub lifecycle: LifecycleConfig,
    /// Log filter and format
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Read `path`; a missing file gives the defaults
    ///
    /// # Errors
    /// Unreadable file or invalid TOML.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// Invalid TOML or mistyped fields.
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply overrides from `lookup`, usually `std::env::var`
    #[must_use]
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup(SPREADSHEET_ID_ENV).filter(|id| !id.trim().is_empty()) {
            self.sheets.spreadsheet_id = id.trim().to_string();
        }
        self
    }

    /// Serialized form, without secrets
    ///
    /// # Errors
    /// Serialization failure.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(AppConfig::from_toml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [sheets]
            spreadsheet_id = "1AbC"

            [repository]
            verify_before_write = true

            [logging]
            json = true
            "#,
        )
        .unwrap();
        assert_eq!(config.sheets.spreadsheet_id, "1AbC");
        assert_eq!(config.sheets.timeout_ms, 30_000);
        assert!(config.repository.verify_before_write);
        assert!(config.logging.json);
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn blank_override_is_ignored() {
        let config = AppConfig::default().apply_env(|_| Some("  ".to_string()));
        assert!(config.sheets.spreadsheet_id.is_empty());
    }
}
