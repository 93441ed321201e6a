//! Status state machine

use crate::error::LifecycleError;
use std::fmt;
use tabula_entities::DocumentStatus;

/// Event that moves a document between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// A (new) file was uploaded
    Upload,
    /// A reviewer assigned an outcome
    Review(DocumentStatus),
    /// The validity window of an approval passed
    Expire,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => f.write_str("upload"),
            Self::Review(to) => write!(f, "review to {to}"),
            Self::Expire => f.write_str("expire"),
        }
    }
}

/// Triggers accepted in status `from` and where each leads
#[must_use]
pub fn allowed_transitions(from: DocumentStatus) -> Vec<(Trigger, DocumentStatus)> {
    let mut allowed = vec![(Trigger::Upload, DocumentStatus::SinRevisar)];
    allowed.extend(
        DocumentStatus::ALL
            .into_iter()
            .filter(|status| status.is_review_outcome())
            .map(|status| (Trigger::Review(status), status)),
    );
    if from == DocumentStatus::Cumplido {
        allowed.push((Trigger::Expire, DocumentStatus::Expirado));
    }
    allowed
}

/// Status reached by applying `trigger` in status `from`
///
/// # Errors
/// `InvalidTransition` when `trigger` is not accepted in `from`.
pub fn validate_transition(
    from: DocumentStatus,
    trigger: Trigger,
) -> Result<DocumentStatus, LifecycleError> {
    match trigger {
        Trigger::Upload => Ok(DocumentStatus::SinRevisar),
        Trigger::Review(to) if to.is_review_outcome() => Ok(to),
        Trigger::Expire if from == DocumentStatus::Cumplido => Ok(DocumentStatus::Expirado),
        Trigger::Review(_) | Trigger::Expire => {
            Err(LifecycleError::InvalidTransition { from, trigger })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_always_resets() {
        for from in DocumentStatus::ALL {
            assert_eq!(
                validate_transition(from, Trigger::Upload).unwrap(),
                DocumentStatus::SinRevisar
            );
        }
    }

    #[test]
    fn review_to_pending_is_rejected() {
        let err = validate_transition(
            DocumentStatus::Cumplido,
            Trigger::Review(DocumentStatus::SinRevisar),
        )
        .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
        assert!(err.is_rejected());
    }

    #[test]
    fn only_approved_documents_expire() {
        assert_eq!(
            validate_transition(DocumentStatus::Cumplido, Trigger::Expire).unwrap(),
            DocumentStatus::Expirado
        );
        for from in [
            DocumentStatus::SinRevisar,
            DocumentStatus::Rechazado,
            DocumentStatus::Expirado,
            DocumentStatus::NoAplica,
        ] {
            assert!(validate_transition(from, Trigger::Expire).is_err());
        }
    }

    #[test]
    fn allowed_list_matches_validation() {
        for from in DocumentStatus::ALL {
            for (trigger, to) in allowed_transitions(from) {
                assert_eq!(validate_transition(from, trigger).unwrap(), to);
            }
        }
        assert!(allowed_transitions(DocumentStatus::Cumplido)
            .contains(&(Trigger::Expire, DocumentStatus::Expirado)));
        assert!(!allowed_transitions(DocumentStatus::Rechazado)
            .iter()
            .any(|(t, _)| *t == Trigger::Expire));
    }

    #[test]
    fn trigger_display() {
        assert_eq!(Trigger::Review(DocumentStatus::NoAplica).to_string(), "review to No aplica");
    }
}
