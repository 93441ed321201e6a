//! Table schema
//!
//! An ordered, non-empty list of field names. Field `i` lives in column `i`.

use crate::column::column_letter;
use crate::error::CodecError;
use crate::record::Record;
use std::collections::HashSet;
use std::sync::Arc;

/// Ordered field list for one logical table
///
/// Cloning is cheap; the field list is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Arc<[String]>,
}

impl Schema {
    /// Create a schema
    ///
    /// # Errors
    /// - `CodecError::EmptySchema` if no fields are given
    /// - `CodecError::DuplicateField` if a name repeats
    pub fn new<I, S>(fields: I) -> Result<Self, CodecError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(CodecError::EmptySchema);
        }

        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.as_str()) {
                return Err(CodecError::DuplicateField(field.clone()));
            }
        }

        Ok(Self {
            fields: fields.into(),
        })
    }

    /// Field names in column order
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of columns spanned
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Zero-based column of a field
    #[must_use]
    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// Whether the schema defines a field
    #[inline]
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.index_of(field).is_some()
    }

    /// Letter of the last column
    #[inline]
    #[must_use]
    pub fn last_column(&self) -> String {
        column_letter(self.fields.len() - 1)
    }

    /// First and last column letters spanned by the schema
    #[inline]
    #[must_use]
    pub fn column_range(&self) -> (String, String) {
        (column_letter(0), self.last_column())
    }

    /// Map a raw row onto a record
    ///
    /// Missing trailing cells become empty strings.
    ///
    /// # Errors
    /// `CodecError::RowTooLong` if the row has more cells than columns.
    pub fn decode(&self, row: &[String]) -> Result<Record, CodecError> {
        if row.len() > self.fields.len() {
            return Err(CodecError::RowTooLong {
                expected: self.fields.len(),
                actual: row.len(),
            });
        }

        let mut record = Record::with_capacity(self.fields.len());
        for (index, field) in self.fields.iter().enumerate() {
            let cell = row.get(index).cloned().unwrap_or_default();
            record.insert(field.clone(), cell);
        }
        Ok(record)
    }

    /// Map a record onto a raw row, one cell per field in schema order
    ///
    /// Absent fields are written as empty strings.
    ///
    /// # Errors
    /// `CodecError::UnknownField` if the record names a field the schema lacks.
    pub fn encode(&self, record: &Record) -> Result<Vec<String>, CodecError> {
        self.check_fields(record)?;
        Ok(self
            .fields
            .iter()
            .map(|field| record.get(field).unwrap_or_default().to_string())
            .collect())
    }

    /// Ensure every field of `record` exists in the schema
    ///
    /// # Errors
    /// `CodecError::UnknownField` for the first unknown field.
    pub fn check_fields(&self, record: &Record) -> Result<(), CodecError> {
        match record.fields().find(|field| !self.contains(field)) {
            Some(unknown) => Err(CodecError::UnknownField(unknown.to_string())),
            None => Ok(()),
        }
    }
}
