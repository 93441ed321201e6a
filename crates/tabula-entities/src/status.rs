//! Review status of an uploaded document

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Review status, stored as its Spanish label in the `estado` column
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum DocumentStatus {
    /// Uploaded, waiting for review
    #[default]
    #[serde(rename = "Sin revisar")]
    SinRevisar,
    /// Approved
    #[serde(rename = "Cumplido")]
    Cumplido,
    /// Rejected by the reviewer
    #[serde(rename = "Rechazado")]
    Rechazado,
    /// Was approved, validity window has passed
    #[serde(rename = "Expirado")]
    Expirado,
    /// Does not apply to this person
    #[serde(rename = "No aplica")]
    NoAplica,
}

impl DocumentStatus {
    /// Every status, in reporting order
    pub const ALL: [Self; 5] = [
        Self::SinRevisar,
        Self::Rechazado,
        Self::Cumplido,
        Self::Expirado,
        Self::NoAplica,
    ];

    /// Label written to the sheet
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SinRevisar => "Sin revisar",
            Self::Cumplido => "Cumplido",
            Self::Rechazado => "Rechazado",
            Self::Expirado => "Expirado",
            Self::NoAplica => "No aplica",
        }
    }

    /// Parse a cell; empty means not yet reviewed
    ///
    /// Accepts the legacy labels `Aprobado` and `Vencido`, ignoring case and
    /// surrounding whitespace.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = text.trim().to_lowercase();
        let status = match normalized.as_str() {
            "" | "sin revisar" | "pendiente" => Self::SinRevisar,
            "cumplido" | "aprobado" => Self::Cumplido,
            "rechazado" => Self::Rechazado,
            "expirado" | "vencido" => Self::Expirado,
            "no aplica" => Self::NoAplica,
            _ => return None,
        };
        Some(status)
    }

    /// A status a reviewer may assign
    #[must_use]
    pub const fn is_review_outcome(self) -> bool {
        !matches!(self, Self::SinRevisar)
    }

    /// Owners should be alerted, not just informed
    #[must_use]
    pub const fn is_alert(self) -> bool {
        matches!(self, Self::Rechazado | Self::Expirado)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text that is not a known status label
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown document status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for DocumentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn labels_round_trip() {
        for status in DocumentStatus::ALL {
            assert_eq!(DocumentStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn legacy_aliases() {
        assert_eq!(DocumentStatus::parse("Aprobado"), Some(DocumentStatus::Cumplido));
        assert_eq!(DocumentStatus::parse(" vencido "), Some(DocumentStatus::Expirado));
        assert_eq!(DocumentStatus::parse(""), Some(DocumentStatus::SinRevisar));
        assert!("Archivado".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn alerts() {
        assert!(DocumentStatus::Rechazado.is_alert());
        assert!(DocumentStatus::Expirado.is_alert());
        assert!(!DocumentStatus::Cumplido.is_alert());
        assert!(!DocumentStatus::SinRevisar.is_review_outcome());
    }

    proptest! {
        #[test]
        fn parse_ignores_case(index in 0usize..5, upper in any::<bool>()) {
            let status = DocumentStatus::ALL[index];
            let label = if upper {
                status.as_str().to_uppercase()
            } else {
                status.as_str().to_lowercase()
            };
            prop_assert_eq!(DocumentStatus::parse(&label), Some(status));
        }
    }
}
