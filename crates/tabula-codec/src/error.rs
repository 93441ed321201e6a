//! Codec errors
//!
//! Every variant is a schema mismatch of some kind: the shape of a row or a
//! record disagrees with the schema in a way that cannot be zero-filled.

/// Schema / row / record disagreement
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A schema must name at least one field
    #[error("schema has no fields")]
    EmptySchema,

    /// Field names must be unique within a schema
    #[error("duplicate field in schema: {0}")]
    DuplicateField(String),

    /// Record carries a field the schema does not define
    #[error("field not in schema: {0}")]
    UnknownField(String),

    /// Row has more cells than the schema has columns
    #[error("row has {actual} cells but schema defines {expected} columns")]
    RowTooLong {
        /// Columns in the schema
        expected: usize,
        /// Cells in the row
        actual: usize,
    },

    /// Required field absent or empty in a typed record
    #[error("missing required field: {0}")]
    MissingField(String),

    /// Cell text could not be parsed into the expected type
    #[error("invalid value {value:?} for field {field}: expected {expected}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Raw cell text
        value: String,
        /// Human readable expectation
        expected: &'static str,
    },
}

impl CodecError {
    /// Build an `InvalidValue` error
    #[inline]
    pub fn invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected,
        }
    }

    /// Whether the error comes from a bad schema definition rather than data
    #[inline]
    #[must_use]
    pub fn is_schema_definition(&self) -> bool {
        matches!(self, Self::EmptySchema | Self::DuplicateField(_))
    }
}
