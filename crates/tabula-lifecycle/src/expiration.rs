//! Expiration of approved documents
//!
//! An approval of an expiring type is valid for `tiempo_vencimiento` days
//! counted from the upload date. The sweep only ever moves `Cumplido`
//! documents, so running it twice on the same day changes nothing the
//! second time.

use crate::notify::Notifications;
use crate::transitions::{validate_transition, Trigger};
use crate::Result;
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;
use tabula_entities::user_documents::status_patch;
use tabula_entities::{DocumentInstance, DocumentStatus, DocumentType, Repositories};
use tracing::{debug, info, warn};

/// Last valid day of an approval of `doc_type` uploaded on `uploaded_on`
///
/// `None` when the type does not expire.
#[must_use]
pub fn expiration_date(doc_type: &DocumentType, uploaded_on: NaiveDate) -> Option<NaiveDate> {
    let window = doc_type.validity_window()?;
    uploaded_on.checked_add_days(Days::new(u64::from(window)))
}

/// Whether an approval uploaded on `uploaded_on` is past its window on `today`
///
/// Documents without an upload date never expire.
#[must_use]
pub fn is_expired(
    doc_type: &DocumentType,
    uploaded_on: Option<NaiveDate>,
    today: NaiveDate,
) -> bool {
    uploaded_on
        .and_then(|uploaded_on| expiration_date(doc_type, uploaded_on))
        .is_some_and(|expires_on| today > expires_on)
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Documents examined
    pub total: usize,
    /// Documents moved to `Expirado`
    pub expired: usize,
    /// Ids of the expired documents, in row order
    pub expired_ids: Vec<String>,
}

/// Batch job expiring approvals whose window has passed
#[derive(Debug, Clone)]
pub struct ExpirationSweep {
    repos: Repositories,
    notifications: Option<Notifications>,
}

impl ExpirationSweep {
    /// Sweep over `repos`, without notifications
    #[must_use]
    pub fn new(repos: Repositories) -> Self {
        Self {
            repos,
            notifications: None,
        }
    }

    /// Notify owners of expired documents
    #[must_use]
    pub fn with_notifications(mut self, notifications: Notifications) -> Self {
        self.notifications = Some(notifications);
        self
    }

    /// Documents a sweep on `today` would expire, and how many were examined
    ///
    /// # Errors
    /// Store failures.
    pub async fn plan(&self, today: NaiveDate) -> Result<(usize, Vec<DocumentInstance>)> {
        let types: HashMap<String, DocumentType> = self
            .repos
            .document_types
            .get_all()
            .await?
            .into_iter()
            .map(|doc_type| (doc_type.id.clone(), doc_type))
            .collect();
        let documents = self.repos.documents.get_all().await?;
        let total = documents.len();

        let due = documents
            .into_iter()
            .filter(|doc| doc.status == DocumentStatus::Cumplido)
            .filter(|doc| {
                let Some(doc_type) = types.get(&doc.type_id) else {
                    debug!(
                        document_id = %doc.id,
                        type_id = %doc.type_id,
                        "approved document of unknown type"
                    );
                    return false;
                };
                is_expired(doc_type, doc.uploaded_on, today)
            })
            .collect();
        Ok((total, due))
    }

    /// Expire every approval whose window has passed on `today`
    ///
    /// All changes go out in one batch write; owners are notified afterwards
    /// without waiting for delivery.
    ///
    /// # Errors
    /// Store failures. Nothing is notified when the write fails.
    pub async fn run(&self, today: NaiveDate) -> Result<SweepReport> {
        let (total, due) = self.plan(today).await?;
        if due.is_empty() {
            info!(total, "expiration sweep found nothing to expire");
            return Ok(SweepReport {
                total,
                ..SweepReport::default()
            });
        }

        let mut updates = Vec::with_capacity(due.len());
        for doc in &due {
            let to = validate_transition(doc.status, Trigger::Expire)?;
            updates.push((doc.id.clone(), status_patch(to, Some(today))));
        }
        let outcome = self.repos.documents.update_many(updates).await?;
        if !outcome.missing.is_empty() {
            warn!(missing = ?outcome.missing, "documents vanished during expiration sweep");
        }

        if let Some(notifications) = &self.notifications {
            for doc in due.iter().filter(|doc| outcome.updated.contains(&doc.id)) {
                notifications.status_changed(
                    &doc.owner_id,
                    &doc.type_name,
                    DocumentStatus::Expirado,
                    today,
                    "",
                );
            }
        }

        info!(total, expired = outcome.updated.len(), "expiration sweep applied");
        Ok(SweepReport {
            total,
            expired: outcome.updated.len(),
            expired_ids: outcome.updated,
        })
    }
}
