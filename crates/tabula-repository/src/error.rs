//! Repository errors

use crate::store::StoreError;
use tabula_codec::CodecError;
use tabula_scheduler::ScheduleError;

/// Repository operation failure
///
/// A missing record is not an error: lookups return `None`, deletes `false`.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Row or record shape disagrees with the schema
    #[error("schema mismatch: {0}")]
    SchemaMismatch(#[from] CodecError),

    /// The store did not confirm an append
    #[error("append to {table} was not confirmed by the store")]
    CreateFailed {
        /// Table name
        table: String,
    },

    /// Remote call failed for a reason other than rate limiting
    #[error("{operation} on {table} failed: {source}")]
    StoreUnavailable {
        /// Table name
        table: String,
        /// Store operation
        operation: &'static str,
        /// Store failure with the remote message
        #[source]
        source: StoreError,
    },

    /// Remote call not serviced before its deadline
    #[error("{operation} on {table} timed out")]
    Timeout {
        /// Table name
        table: String,
        /// Store operation
        operation: &'static str,
    },

    /// Row changed between the scan and the write
    #[error("row {row} of {table} changed since it was read")]
    ConcurrentModification {
        /// Table name
        table: String,
        /// Physical row
        row: u32,
    },
}

impl RepositoryError {
    /// Wrap a scheduler failure for `operation` on `table`
    pub(crate) fn from_schedule(
        table: &str,
        operation: &'static str,
        error: ScheduleError<StoreError>,
    ) -> Self {
        match error {
            ScheduleError::Remote(source) => Self::StoreUnavailable {
                table: table.to_string(),
                operation,
                source,
            },
            ScheduleError::Timeout { .. } | ScheduleError::Abandoned => Self::Timeout {
                table: table.to_string(),
                operation,
            },
        }
    }

    /// Check if the operation may succeed when repeated
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::ConcurrentModification { .. } => true,
            Self::StoreUnavailable { source, .. } => source.is_retryable(),
            Self::SchemaMismatch(_) | Self::CreateFailed { .. } => false,
        }
    }

    /// Check if the table itself is missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::StoreUnavailable { source, .. } if source.is_not_found())
    }
}
