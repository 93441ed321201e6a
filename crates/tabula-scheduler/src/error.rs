//! Scheduler errors
//!
//! Rate-limit signals are absorbed by the scheduler and never appear here.

use std::time::Duration;

/// Why a scheduled call did not produce a value
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError<E> {
    /// The remote call failed with something other than a rate-limit signal
    #[error("{0}")]
    Remote(E),

    /// The call was not serviced before its deadline
    #[error("call not serviced within {}ms", waited.as_millis())]
    Timeout {
        /// Deadline that elapsed
        waited: Duration,
    },

    /// The scheduler dropped the call without resolving it (runtime shutdown)
    #[error("call abandoned before completion")]
    Abandoned,
}

impl<E> ScheduleError<E> {
    /// Whether the call never reached a final remote answer
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Abandoned)
    }

    /// The remote failure, if that is what this is
    #[inline]
    pub fn into_remote(self) -> Option<E> {
        match self {
            Self::Remote(error) => Some(error),
            _ => None,
        }
    }

    /// Map the remote failure type
    pub fn map_remote<F>(self, f: impl FnOnce(E) -> F) -> ScheduleError<F> {
        match self {
            Self::Remote(error) => ScheduleError::Remote(f(error)),
            Self::Timeout { waited } => ScheduleError::Timeout { waited },
            Self::Abandoned => ScheduleError::Abandoned,
        }
    }
}
