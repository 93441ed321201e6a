//! Tabula Repository - typed collections over a remote tabular store
//!
//! A [`TabularRepository`] treats the data rows of one table as a collection
//! of [`Record`](tabula_codec::Record)s. Row 1 is the header; row positions are
//! recomputed by a full scan on every mutating call and are never cached.
//! Every remote call goes through the shared
//! [`RateLimitedScheduler`](tabula_scheduler::RateLimitedScheduler).
//!
//! [`EntityRepository`] layers a [`SheetRecord`](tabula_codec::SheetRecord)
//! type on top for callers that want structs instead of string maps.

pub mod config;
pub mod entity;
pub mod error;
pub mod store;
pub mod table;

pub use config::RepositoryConfig;
pub use entity::EntityRepository;
pub use error::RepositoryError;
pub use store::{RangeUpdate, StoreError, TableId, TabularStore};
pub use table::{BatchOutcome, TabularRepository};

/// Scheduler type shared by every repository
pub type StoreScheduler = tabula_scheduler::RateLimitedScheduler<StoreError>;

/// Result alias for repository operations
pub type Result<T> = std::result::Result<T, RepositoryError>;
