//! Tabula Scheduler - rate-limit-aware request gate
//!
//! Every call to the remote tabular API goes through one
//! [`RateLimitedScheduler`]. It is purely reactive:
//! - **Normal** mode: calls run immediately on the caller's task
//! - **Saturated** mode: entered on the first rate-limit signal; calls are
//!   funnelled through a single FIFO queue drained by one background task
//!   with exponential backoff
//!
//! Rate-limit signals never reach callers. Any other failure is returned
//! unchanged.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabula_scheduler::{RateLimitedScheduler, SchedulerConfig};
//!
//! let scheduler = RateLimitedScheduler::new(SchedulerConfig::default());
//! let rows = scheduler
//!     .execute(move || {
//!         let store = store.clone();
//!         async move { store.get_range(&range).await }
//!     })
//!     .await?;
//! ```

mod call;
pub mod config;
pub mod error;
pub mod policy;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use error::ScheduleError;
pub use policy::{RateLimitPolicy, RemoteFailure};
pub use scheduler::{RateLimitedScheduler, SchedulerMode, SchedulerSnapshot};
