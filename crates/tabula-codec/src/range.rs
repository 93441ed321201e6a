//! Range notation
//!
//! `CellRange` is the value form of `Table!A2:M` / `Table!A5:M5` / `Table!A1`.
//! Rows are 1-based and optional on either end (open ranges run to the last
//! row with data).

use crate::column::column_letter;
use crate::schema::Schema;
use crate::FIRST_DATA_ROW;
use std::fmt;

/// A rectangular (possibly open-ended) range within one table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellRange {
    table: String,
    start_column: usize,
    start_row: Option<u32>,
    end: Option<(usize, Option<u32>)>,
}

impl CellRange {
    /// Arbitrary range from `(start_column, start_row)` to `(end_column, end_row)`
    #[must_use]
    pub fn span(
        table: impl Into<String>,
        start_column: usize,
        start_row: Option<u32>,
        end_column: usize,
        end_row: Option<u32>,
    ) -> Self {
        Self {
            table: table.into(),
            start_column,
            start_row,
            end: Some((end_column, end_row)),
        }
    }

    /// All data rows across the schema columns: `Table!A2:<last>`
    #[must_use]
    pub fn data(table: impl Into<String>, schema: &Schema) -> Self {
        Self::span(table, 0, Some(FIRST_DATA_ROW), schema.len() - 1, None)
    }

    /// One full physical row: `Table!A<row>:<last><row>`
    #[must_use]
    pub fn row(table: impl Into<String>, schema: &Schema, row: u32) -> Self {
        Self::span(table, 0, Some(row), schema.len() - 1, Some(row))
    }

    /// Append anchor: `Table!A1`
    #[must_use]
    pub fn anchor(table: impl Into<String>) -> Self {
        Self::cell(table, 0, 1)
    }

    /// Single cell
    #[must_use]
    pub fn cell(table: impl Into<String>, column: usize, row: u32) -> Self {
        Self {
            table: table.into(),
            start_column: column,
            start_row: Some(row),
            end: None,
        }
    }

    /// Table (sheet) name
    #[inline]
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Zero-based first column
    #[inline]
    #[must_use]
    pub fn start_column(&self) -> usize {
        self.start_column
    }

    /// 1-based first row, `None` for "from the top"
    #[inline]
    #[must_use]
    pub fn start_row(&self) -> Option<u32> {
        self.start_row
    }

    /// Zero-based last column (equal to the start for single cells)
    #[inline]
    #[must_use]
    pub fn end_column(&self) -> usize {
        self.end.map_or(self.start_column, |(column, _)| column)
    }

    /// 1-based last row, `None` for "to the last row with data"
    #[inline]
    #[must_use]
    pub fn end_row(&self) -> Option<u32> {
        match self.end {
            Some((_, row)) => row,
            None => self.start_row,
        }
    }

    /// Number of columns covered
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.end_column().saturating_sub(self.start_column) + 1
    }

    /// Table name as it must appear in A1 notation
    #[must_use]
    pub fn quoted_table(&self) -> String {
        quote_table(&self.table)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", quote_table(&self.table), column_letter(self.start_column))?;
        if let Some(row) = self.start_row {
            write!(f, "{row}")?;
        }
        if let Some((column, row)) = self.end {
            write!(f, ":{}", column_letter(column))?;
            if let Some(row) = row {
                write!(f, "{row}")?;
            }
        }
        Ok(())
    }
}

fn quote_table(table: &str) -> String {
    let plain = !table.is_empty() && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        table.to_string()
    } else {
        format!("'{}'", table.replace('\'', "''"))
    }
}
