//! Scheduler configuration

use crate::policy::RateLimitPolicy;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff and detection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Backoff base restored after every successful queued call
    pub base_delay_ms: u64,
    /// Ceiling for the backoff base and for any single wait
    pub max_delay_ms: u64,
    /// Unit of the per-entry exponential term (`2^attempts * unit`)
    pub backoff_unit_ms: u64,
    /// Upper bound of the random jitter added to the exponential term
    pub jitter_ms: u64,
    /// Deadline applied by [`execute`](crate::RateLimitedScheduler::execute); none when `None`
    pub default_deadline_ms: Option<u64>,
    /// Which failures are rate-limit signals
    pub rate_limit: RateLimitPolicy,
}

impl SchedulerConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With backoff base and ceiling
    #[inline]
    #[must_use]
    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay_ms = duration_ms(base);
        self.max_delay_ms = duration_ms(max);
        self
    }

    /// With exponential unit
    #[inline]
    #[must_use]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit_ms = duration_ms(unit);
        self
    }

    /// With jitter bound (zero disables jitter)
    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter_ms = duration_ms(jitter);
        self
    }

    /// With a deadline for every call
    #[inline]
    #[must_use]
    pub fn with_default_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline_ms = Some(duration_ms(deadline));
        self
    }

    /// With a rate-limit policy
    #[inline]
    #[must_use]
    pub fn with_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = policy;
        self
    }

    /// Backoff base
    #[inline]
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Backoff ceiling
    #[inline]
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms.max(self.base_delay_ms))
    }

    /// Deadline for `execute`, if configured
    #[inline]
    #[must_use]
    pub fn default_deadline(&self) -> Option<Duration> {
        self.default_deadline_ms.map(Duration::from_millis)
    }

    /// Next backoff base after a rate-limit signal
    #[must_use]
    pub fn escalate(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay())
    }

    /// Wait before invoking an entry that has been tried `attempts` times
    ///
    /// `max(current_base, 2^attempts * unit + jitter)`, capped at the ceiling.
    #[must_use]
    pub fn wait_for(&self, attempts: u32, current_base: Duration) -> Duration {
        let unit = Duration::from_millis(self.backoff_unit_ms);
        let exponential = unit
            .saturating_mul(2u32.saturating_pow(attempts))
            .saturating_add(self.jitter());
        current_base.max(exponential).min(self.max_delay())
    }

    fn jitter(&self) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=self.jitter_ms))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_unit_ms: 1_000,
            jitter_ms: 1_000,
            default_deadline_ms: None,
            rate_limit: RateLimitPolicy::default(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
