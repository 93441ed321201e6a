//! Sheets client configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Sheets v4 spreadsheets endpoint
pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Environment variable read for the access token when none is configured
pub const DEFAULT_TOKEN_ENV: &str = "TABULA_SHEETS_TOKEN";

/// Configuration that cannot be used to build a client
#[derive(Debug, thiserror::Error)]
pub enum SheetsConfigError {
    /// No spreadsheet id configured
    #[error("spreadsheet id is not configured")]
    MissingSpreadsheetId,

    /// Neither a configured token nor the token variable is set
    #[error("no access token: set access_token or the {env} environment variable")]
    MissingToken {
        /// Variable that was checked
        env: String,
    },

    /// Base URL does not parse
    #[error("invalid base url {url}: {reason}")]
    InvalidBaseUrl {
        /// Configured URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// HTTP client construction failed
    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Where the spreadsheet lives and how to authenticate
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// Spreadsheet id from its URL
    pub spreadsheet_id: String,
    /// API endpoint, overridable for proxies and tests
    pub base_url: String,
    /// Bearer token; takes precedence over `access_token_env`
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// Environment variable holding the bearer token
    pub access_token_env: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetsConfig")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("access_token_env", &self.access_token_env)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
            access_token_env: DEFAULT_TOKEN_ENV.to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl SheetsConfig {
    /// Configuration for `spreadsheet_id` with defaults elsewhere
    #[must_use]
    pub fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            ..Self::default()
        }
    }

    /// With a fixed token
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// With a different endpoint
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// With a different request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Request timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Configured token, else the token variable
    ///
    /// # Errors
    /// `MissingToken` when neither is set or both are blank.
    pub fn resolve_token(&self) -> Result<String, SheetsConfigError> {
        self.access_token
            .clone()
            .or_else(|| std::env::var(&self.access_token_env).ok())
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| SheetsConfigError::MissingToken {
                env: self.access_token_env.clone(),
            })
    }

    /// Check everything needed to build a client except the token
    ///
    /// # Errors
    /// `MissingSpreadsheetId`, `InvalidBaseUrl`.
    pub fn validate(&self) -> Result<(), SheetsConfigError> {
        if self.spreadsheet_id.trim().is_empty() {
            return Err(SheetsConfigError::MissingSpreadsheetId);
        }
        reqwest::Url::parse(&self.base_url).map_err(|err| SheetsConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: err.to_string(),
        })?;
        Ok(())
    }
}
