//! Rate-limit detection
//!
//! The remote API signals overload with HTTP 429, or with a 500 whose
//! message mentions a quota. Both the statuses and the message markers are
//! configuration, not code.

use serde::{Deserialize, Serialize};

/// What the scheduler needs to know about a failed remote call
pub trait RemoteFailure {
    /// HTTP-like status code, when the failure carries one
    fn status_code(&self) -> Option<u16>;

    /// Human readable message from the remote side
    fn failure_message(&self) -> String;
}

/// Predicate deciding which failures are rate-limit signals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitPolicy {
    /// Statuses that always mean "back off"
    pub statuses: Vec<u16>,
    /// Statuses that mean "back off" only when the message has a marker
    pub quota_statuses: Vec<u16>,
    /// Case-insensitive message fragments marking a quota failure
    pub quota_markers: Vec<String>,
}

impl RateLimitPolicy {
    /// Default policy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the always-rate-limited statuses
    #[inline]
    #[must_use]
    pub fn with_statuses(mut self, statuses: impl Into<Vec<u16>>) -> Self {
        self.statuses = statuses.into();
        self
    }

    /// Replace the quota statuses and markers
    #[must_use]
    pub fn with_quota_markers<S: Into<String>>(
        mut self,
        statuses: impl Into<Vec<u16>>,
        markers: impl IntoIterator<Item = S>,
    ) -> Self {
        self.quota_statuses = statuses.into();
        self.quota_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `failure` is a rate-limit signal
    pub fn is_rate_limited<F: RemoteFailure + ?Sized>(&self, failure: &F) -> bool {
        let Some(status) = failure.status_code() else {
            return false;
        };
        if self.statuses.contains(&status) {
            return true;
        }
        if !self.quota_statuses.contains(&status) {
            return false;
        }
        let message = failure.failure_message().to_lowercase();
        self.quota_markers
            .iter()
            .any(|marker| message.contains(&marker.to_lowercase()))
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            statuses: vec![429],
            quota_statuses: vec![500],
            quota_markers: vec!["quota exceeded".to_string(), "rate limit".to_string()],
        }
    }
}
