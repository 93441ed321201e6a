//! Status-change notifications
//!
//! Delivery runs on its own task. Failures are logged and never reach the
//! operation that triggered them.

use crate::ports::Notifier;
use chrono::NaiveDate;
use std::sync::Arc;
use tabula_codec::cell::format_date;
use tabula_entities::{DocumentStatus, User, UsersRepository};
use tracing::{debug, warn};

/// Rendered notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
}

fn status_summary(status: DocumentStatus) -> &'static str {
    match status {
        DocumentStatus::SinRevisar => "está pendiente de revisión",
        DocumentStatus::Cumplido => "cumple con todos los requisitos",
        DocumentStatus::Rechazado => "ha sido rechazado y requiere corrección",
        DocumentStatus::Expirado => "ha expirado y necesita ser actualizado",
        DocumentStatus::NoAplica => "no aplica para tu caso",
    }
}

fn next_step(status: DocumentStatus) -> &'static str {
    match status {
        DocumentStatus::SinRevisar | DocumentStatus::NoAplica => {
            "No se requiere ninguna acción adicional."
        }
        DocumentStatus::Cumplido => "Tu documento está al día.",
        DocumentStatus::Rechazado => {
            "Por favor, ingresa al sistema para revisar los comentarios y volver a cargar el documento corregido."
        }
        DocumentStatus::Expirado => {
            "Es necesario que subas una versión actualizada del documento."
        }
    }
}

/// Build the message telling `user` that `document_name` is now `status`
///
/// `None` when the user has no address to write to.
#[must_use]
pub fn status_change_message(
    user: &User,
    document_name: &str,
    status: DocumentStatus,
    changed_on: NaiveDate,
    comment: &str,
) -> Option<StatusMessage> {
    let to = user.notification_email()?.to_string();
    let alert = if status.is_alert() { "⚠️ " } else { "" };
    let subject = format!("{alert}Notificación: {document_name} - {status}");

    let mut body = format!(
        "Hola {name},\n\nTu documento \"{document_name}\" {summary}.\nEstado: {status}\nFecha de revisión: {date}\n",
        name = user.full_name(),
        summary = status_summary(status),
        date = format_date(Some(changed_on)),
    );
    if !comment.trim().is_empty() {
        body.push_str(&format!("Comentarios: {}\n", comment.trim()));
    }
    body.push('\n');
    body.push_str(next_step(status));
    body.push('\n');

    Some(StatusMessage { to, subject, body })
}

/// Fire-and-forget dispatcher
#[derive(Clone)]
pub struct Notifications {
    notifier: Arc<dyn Notifier>,
    users: UsersRepository,
}

impl std::fmt::Debug for Notifications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifications").finish_non_exhaustive()
    }
}

impl Notifications {
    /// Dispatcher resolving owners through `users`
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, users: UsersRepository) -> Self {
        Self { notifier, users }
    }

    /// Tell the owner of a document about its new status
    ///
    /// Returns immediately; the owner lookup and delivery happen on a spawned
    /// task and their failures are only logged.
    pub fn status_changed(
        &self,
        owner_id: &str,
        document_name: &str,
        status: DocumentStatus,
        changed_on: NaiveDate,
        comment: &str,
    ) -> tokio::task::JoinHandle<bool> {
        let notifier = Arc::clone(&self.notifier);
        let users = self.users.clone();
        let owner_id = owner_id.to_string();
        let document_name = document_name.to_string();
        let comment = comment.to_string();

        tokio::spawn(async move {
            let user = match users.find_by_id(&owner_id).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    warn!(owner_id, "notification skipped: owner not found");
                    return false;
                }
                Err(err) => {
                    warn!(owner_id, error = %err, "notification skipped: owner lookup failed");
                    return false;
                }
            };
            let Some(message) =
                status_change_message(&user, &document_name, status, changed_on, &comment)
            else {
                warn!(owner_id, "notification skipped: owner has no email");
                return false;
            };

            let sent = notifier
                .send_status_change(&message.to, &message.subject, &message.body)
                .await;
            if sent {
                debug!(owner_id, status = %status, "notification sent");
            } else {
                warn!(owner_id, to = %message.to, status = %status, "notification not delivered");
            }
            sent
        })
    }
}
