//! Typed cell codecs
//!
//! Sheets hand back whatever the user typed, so parsing is lenient about
//! spelling but strict about meaning: an unparseable cell is an error, an
//! empty one is "no value".

use crate::error::CodecError;
use chrono::NaiveDate;
use std::str::FromStr;

/// Canonical date layout written to cells
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Alternate layouts accepted when reading (locale formatted entries)
const READ_DATE_FORMATS: &[&str] = &[DATE_FORMAT, "%d/%m/%Y", "%Y/%m/%d"];

/// How a boolean is spelled when written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagStyle {
    /// `si` / `no`
    YesNo,
    /// `1` / `0`
    Digit,
}

/// Parse an optional date; empty cells are `None`
///
/// A trailing time component (`2024-03-01T10:00:00Z`) is ignored.
///
/// # Errors
/// `CodecError::InvalidValue` when the text is not a date in a known layout.
pub fn parse_date(field: &str, text: &str) -> Result<Option<NaiveDate>, CodecError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let date_part = trimmed.split('T').next().unwrap_or(trimmed);
    READ_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
        .map(Some)
        .ok_or_else(|| CodecError::invalid(field, text, "date (YYYY-MM-DD)"))
}

/// Parse a date that must be present
///
/// # Errors
/// `CodecError::MissingField` when empty, `InvalidValue` when unparseable.
pub fn parse_required_date(field: &str, text: &str) -> Result<NaiveDate, CodecError> {
    parse_date(field, text)?.ok_or_else(|| CodecError::MissingField(field.to_string()))
}

/// Render an optional date; `None` is the empty string
#[must_use]
pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default()
}

/// Parse a yes/no cell; empty is `false`
///
/// # Errors
/// `CodecError::InvalidValue` for text that is neither truthy nor falsy.
pub fn parse_flag(field: &str, text: &str) -> Result<bool, CodecError> {
    match text.trim().to_lowercase().as_str() {
        "si" | "sí" | "s" | "yes" | "y" | "true" | "verdadero" | "1" | "x" => Ok(true),
        "" | "no" | "n" | "false" | "falso" | "0" => Ok(false),
        _ => Err(CodecError::invalid(field, text, "yes/no flag")),
    }
}

/// Render a flag in the given style
#[must_use]
pub fn format_flag(value: bool, style: FlagStyle) -> String {
    let text = match (style, value) {
        (FlagStyle::YesNo, true) => "si",
        (FlagStyle::YesNo, false) => "no",
        (FlagStyle::Digit, true) => "1",
        (FlagStyle::Digit, false) => "0",
    };
    text.to_string()
}

/// Parse a number; empty cells yield `default`
///
/// # Errors
/// `CodecError::InvalidValue` when the text is not a number of type `T`.
pub fn parse_number<T: FromStr>(field: &str, text: &str, default: T) -> Result<T, CodecError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    trimmed
        .parse()
        .map_err(|_| CodecError::invalid(field, text, "number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn dates_in_known_layouts() {
        assert_eq!(parse_date("f", "2024-03-01").unwrap(), Some(date(2024, 3, 1)));
        assert_eq!(parse_date("f", "01/03/2024").unwrap(), Some(date(2024, 3, 1)));
        assert_eq!(parse_date("f", "2024-03-01T08:30:00.000Z").unwrap(), Some(date(2024, 3, 1)));
        assert_eq!(parse_date("f", "  ").unwrap(), None);
    }

    #[test]
    fn bad_date_is_invalid_value() {
        let err = parse_date("fecha_cargue", "ayer").unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidValue { ref field, .. } if field == "fecha_cargue"
        ));
    }

    #[test]
    fn required_date() {
        assert!(matches!(parse_required_date("f", ""), Err(CodecError::MissingField(_))));
        assert_eq!(parse_required_date("f", "2023-12-31").unwrap(), date(2023, 12, 31));
    }

    #[test]
    fn format_round_trips() {
        assert_eq!(format_date(Some(date(2024, 1, 5))), "2024-01-05");
        assert_eq!(format_date(None), "");
    }

    #[test]
    fn flag_spellings() {
        for yes in ["si", "Sí", "TRUE", "1", "yes"] {
            assert!(parse_flag("vence", yes).unwrap(), "{yes}");
        }
        for no in ["", "no", "False", "0"] {
            assert!(!parse_flag("vence", no).unwrap(), "{no}");
        }
        assert!(parse_flag("vence", "quizás").is_err());
    }

    #[test]
    fn flag_styles() {
        assert_eq!(format_flag(true, FlagStyle::YesNo), "si");
        assert_eq!(format_flag(false, FlagStyle::Digit), "0");
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_number("dosis", "", 1u32).unwrap(), 1);
        assert_eq!(parse_number("dosis", " 3 ", 1u32).unwrap(), 3);
        assert_eq!(parse_number("tiempo", "-5", 0i64).unwrap(), -5);
        assert!(parse_number("dosis", "tres", 1u32).is_err());
    }
}
