//! Lifecycle errors

use crate::ports::FileStoreError;
use crate::transitions::Trigger;
use tabula_codec::CodecError;
use tabula_entities::DocumentStatus;
use tabula_repository::RepositoryError;

/// Document lifecycle failure
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Document type id not in the catalogue
    #[error("unknown document type: {0}")]
    UnknownDocumentType(String),

    /// No document with this id
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// File type outside the allowlist
    #[error("file type not allowed: {0}")]
    UnsupportedMimeType(String),

    /// Dose number outside `1..=doses` of the type
    #[error("dose {dose} out of range for document type {type_id} (1..={max})")]
    DoseOutOfRange {
        /// Document type id
        type_id: String,
        /// Requested dose
        dose: u32,
        /// Doses tracked for the type
        max: u32,
    },

    /// Trigger not allowed from the current status
    #[error("cannot apply {trigger} to a document in status {from}")]
    InvalidTransition {
        /// Current status
        from: DocumentStatus,
        /// Rejected trigger
        trigger: Trigger,
    },

    /// Spreadsheet access failed
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// File storage failed
    #[error(transparent)]
    FileStore(#[from] FileStoreError),

    /// A row could not be decoded
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] CodecError),
}

impl LifecycleError {
    /// Caller asked for something that does not exist
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownDocumentType(_) | Self::DocumentNotFound(_))
    }

    /// Request was rejected on validation, nothing was written
    #[inline]
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMimeType(_)
                | Self::DoseOutOfRange { .. }
                | Self::InvalidTransition { .. }
        )
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Repository(err) => err.is_retryable(),
            Self::FileStore(err) => err.is_retryable(),
            _ => false,
        }
    }
}
