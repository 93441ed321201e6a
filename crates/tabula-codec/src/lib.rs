//! Tabula Codec - schema-driven row mapping
//!
//! Pure mapping between an ordered field list and the coordinates of a
//! spreadsheet-style range:
//! - Column letters (bijective base-26: A..Z, AA..ZZ, AAA..)
//! - Range notation (`Table!A2:M`)
//! - Row <-> [`Record`] encoding with zero-filled short rows
//! - Typed cell codecs for dates, flags and numbers
//!
//! # Example
//!
//! ```rust
//! use tabula_codec::{Record, Schema};
//!
//! let schema = Schema::new(["id", "name"]).unwrap();
//! assert_eq!(schema.column_range(), ("A".to_string(), "B".to_string()));
//!
//! let record = Record::new().with("id", "1").with("name", "Ana");
//! let row = schema.encode(&record).unwrap();
//! assert_eq!(row, vec!["1", "Ana"]);
//! assert_eq!(schema.decode(&row).unwrap(), record);
//! ```

pub mod cell;
pub mod column;
pub mod error;
pub mod range;
pub mod record;
pub mod schema;

pub use column::{column_index, column_letter};
pub use error::CodecError;
pub use range::CellRange;
pub use record::{Record, SheetRecord};
pub use schema::Schema;

/// Physical row holding the field names in every table.
pub const HEADER_ROW: u32 = 1;

/// First physical row holding data.
pub const FIRST_DATA_ROW: u32 = 2;
