//! Remote tabular store port
//!
//! The store speaks ranges and string cells only. Implementations live
//! elsewhere (`tabula-sheets` for the real API, an in-memory one for tests).

use async_trait::async_trait;
use tabula_codec::CellRange;
use tabula_scheduler::RemoteFailure;

/// Internal numeric id of a table, needed for structural edits such as row deletion
pub type TableId = u64;

/// One range write inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeUpdate {
    /// Target range (one row)
    pub range: CellRange,
    /// Cell values in column order
    pub values: Vec<String>,
}

impl RangeUpdate {
    /// New range write
    #[inline]
    #[must_use]
    pub fn new(range: CellRange, values: Vec<String>) -> Self {
        Self { range, values }
    }
}

/// Failure reported by a [`TabularStore`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Remote API answered with a failure status
    #[error("remote error {status}: {message}")]
    Remote {
        /// HTTP status
        status: u16,
        /// Message from the remote side, unmodified
        message: String,
    },

    /// Request never got a response
    #[error("transport error: {0}")]
    Transport(String),

    /// Named table does not exist
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// Response could not be interpreted
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl StoreError {
    /// Remote failure with status and message
    #[inline]
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Status code, for remote failures
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transient failure worth retrying later
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Remote { status, .. } => *status == 429 || *status >= 500,
            Self::TableNotFound(_) | Self::Malformed(_) => false,
        }
    }

    /// The addressed table or range does not exist
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TableNotFound(_) | Self::Remote { status: 404, .. })
    }
}

impl RemoteFailure for StoreError {
    fn status_code(&self) -> Option<u16> {
        self.status()
    }

    fn failure_message(&self) -> String {
        match self {
            Self::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Remote tabular API
///
/// Rows are lists of strings; a read may return rows shorter than the range
/// (trailing empty cells omitted) and omits trailing empty rows entirely.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TabularStore: Send + Sync + 'static {
    /// Read every row in `range`
    async fn get_range(&self, range: &CellRange) -> Result<Vec<Vec<String>>, StoreError>;

    /// Append one row after the last row with data in the table of `anchor`
    ///
    /// Returns the row as the store recorded it, or `None` when the store did
    /// not confirm the write.
    async fn append_row(
        &self,
        anchor: &CellRange,
        values: Vec<String>,
    ) -> Result<Option<Vec<String>>, StoreError>;

    /// Overwrite `range` with one row of values
    async fn update_range(&self, range: &CellRange, values: Vec<String>) -> Result<(), StoreError>;

    /// Apply several range writes in one request; returns the number of cells updated
    async fn batch_update(&self, table: &str, updates: Vec<RangeUpdate>) -> Result<u64, StoreError>;

    /// Resolve the internal id of `table`
    async fn describe_table(&self, table: &str) -> Result<TableId, StoreError>;

    /// Remove physical row `row` (1-based), shifting later rows up
    async fn delete_row(&self, table: &str, table_id: TableId, row: u32) -> Result<(), StoreError>;
}
