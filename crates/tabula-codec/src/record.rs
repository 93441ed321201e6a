//! Records
//!
//! A [`Record`] is one decoded row: field name to cell text. The store has no
//! native typing, so every value is a string; typed entities implement
//! [`SheetRecord`] to convert in and out.

use crate::error::CodecError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One row as an ordered field -> text map
///
/// Equality ignores field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: IndexMap<String, String>,
}

impl Record {
    /// Empty record
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty record with room for `capacity` fields
    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: IndexMap::with_capacity(capacity),
        }
    }

    /// Builder form of [`Record::insert`]
    #[inline]
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl ToString) -> Self {
        self.insert(field, value);
        self
    }

    /// Builder form of [`Record::insert_opt`]
    #[inline]
    #[must_use]
    pub fn with_opt<V: ToString>(mut self, field: impl Into<String>, value: Option<V>) -> Self {
        self.insert_opt(field, value);
        self
    }

    /// Set a field, coercing the value to its string form
    #[inline]
    pub fn insert(&mut self, field: impl Into<String>, value: impl ToString) -> Option<String> {
        self.values.insert(field.into(), value.to_string())
    }

    /// Set a field; `None` is stored as the empty string
    #[inline]
    pub fn insert_opt<V: ToString>(
        &mut self,
        field: impl Into<String>,
        value: Option<V>,
    ) -> Option<String> {
        let text = value.map(|v| v.to_string()).unwrap_or_default();
        self.values.insert(field.into(), text)
    }

    /// Cell text for a field
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// Cell text for a field, or `CodecError::MissingField` if absent or empty
    ///
    /// # Errors
    /// `CodecError::MissingField` when the field has no non-empty value.
    pub fn require(&self, field: &str) -> Result<&str, CodecError> {
        match self.get(field) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(CodecError::MissingField(field.to_string())),
        }
    }

    /// Cell text for a field, empty string when absent
    #[inline]
    #[must_use]
    pub fn text(&self, field: &str) -> &str {
        self.get(field).unwrap_or_default()
    }

    /// Remove a field
    #[inline]
    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.values.shift_remove(field)
    }

    /// Field names in insertion order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// `(field, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// No fields at all
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Every value is empty or whitespace
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.values.values().all(|v| v.trim().is_empty())
    }

    /// Overwrite fields with those present in `patch`
    pub fn merge(&mut self, patch: &Record) {
        for (field, value) in &patch.values {
            self.values.insert(field.clone(), value.clone());
        }
    }

    /// Copy of `self` with `patch` applied
    #[must_use]
    pub fn merged(&self, patch: &Record) -> Record {
        let mut out = self.clone();
        out.merge(patch);
        out
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (field, value) in iter {
            record.insert(field, value);
        }
        record
    }
}

/// A typed entity stored as one row of a fixed table
///
/// Implementors own the mapping between their fields and the string cells
/// of the table; the generic CRUD engine only ever sees [`Record`]s.
pub trait SheetRecord: Clone + Send + Sync + Sized + 'static {
    /// Table (sheet) name
    const TABLE: &'static str;

    /// Column order of the table
    const FIELDS: &'static [&'static str];

    /// Field carrying the caller-assigned identity
    const ID_FIELD: &'static str;

    /// Identity value of this record
    fn id(&self) -> &str;

    /// Encode into a record keyed by `FIELDS`
    fn to_record(&self) -> Record;

    /// Decode from a record keyed by `FIELDS`
    ///
    /// # Errors
    /// `CodecError` when a required field is missing or a cell does not parse.
    fn from_record(record: &Record) -> Result<Self, CodecError>;
}
