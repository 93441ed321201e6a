//! Tabula Sheets - the tabular store backed by a Google spreadsheet
//!
//! Each table is a sheet (tab) of one spreadsheet, addressed by its title.
//! [`SheetsStore`] speaks the Sheets v4 REST API with a bearer token; how the
//! token is obtained is up to the deployment.

pub mod config;
pub mod store;
mod wire;

pub use config::{SheetsConfig, SheetsConfigError, DEFAULT_BASE_URL, DEFAULT_TOKEN_ENV};
pub use store::SheetsStore;
