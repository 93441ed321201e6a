//! Upload, review and reporting flows

use crate::config::LifecycleConfig;
use crate::error::LifecycleError;
use crate::expiration::{expiration_date, ExpirationSweep, SweepReport};
use crate::notify::Notifications;
use crate::ports::{file_id_from_url, Clock, FileStore, Notifier, StoredFile};
use crate::transitions::{validate_transition, Trigger};
use crate::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tabula_codec::cell::format_date;
use tabula_codec::Record;
use tabula_entities::user_documents::{columns, status_patch};
use tabula_entities::{DocumentInstance, DocumentStatus, DocumentType, Repositories};
use tabula_repository::BatchOutcome;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A file to attach to a document
#[derive(Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Owner (`USUARIOS.id_usuario`)
    pub owner_id: String,
    /// Document type (`DOCUMENTOS.id_doc`)
    pub type_id: String,
    /// Dose for multi-dose types; 1 when absent
    pub dose: Option<u32>,
    /// Original file name, used for the extension
    pub file_name: String,
    /// Declared MIME type
    pub mime_type: String,
    /// File bytes
    pub content: Vec<u8>,
    /// Issue date printed on the document
    pub issued_on: Option<NaiveDate>,
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("owner_id", &self.owner_id)
            .field("type_id", &self.type_id)
            .field("dose", &self.dose)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("content_len", &self.content.len())
            .field("issued_on", &self.issued_on)
            .finish()
    }
}

/// A document joined with its type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentView {
    /// The stored row
    pub document: DocumentInstance,
    /// Its catalogue entry, or the `Desconocido` placeholder
    pub document_type: DocumentType,
}

impl DocumentView {
    /// Expiration date of an approval, when the type expires
    #[must_use]
    pub fn expires_on(&self) -> Option<NaiveDate> {
        self.document
            .expires_on
            .or_else(|| expiration_date(&self.document_type, self.document.uploaded_on?))
    }
}

/// One entry of a batch review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewUpdate {
    /// Document id
    pub id: String,
    /// Outcome
    pub status: DocumentStatus,
    /// Reviewer comment; `None` leaves the stored one
    pub comment: Option<String>,
}

/// Document counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    /// Rows counted
    pub total: usize,
    /// Rows per recognised status; every status is present
    pub by_status: BTreeMap<DocumentStatus, usize>,
    /// Rows per unrecognised `estado` text
    pub unexpected: BTreeMap<String, usize>,
}

impl Statistics {
    /// Count for `status`
    #[must_use]
    pub fn count(&self, status: DocumentStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or_default()
    }
}

/// Document lifecycle over the three repositories
pub struct DocumentService {
    repos: Repositories,
    files: Arc<dyn FileStore>,
    notifications: Notifications,
    clock: Arc<dyn Clock>,
    config: LifecycleConfig,
}

impl fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentService")
            .field("repos", &self.repos)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DocumentService {
    /// Create the service
    #[must_use]
    pub fn new(
        repos: Repositories,
        files: Arc<dyn FileStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: LifecycleConfig,
    ) -> Self {
        let notifications = Notifications::new(notifier, repos.users.clone());
        Self {
            repos,
            files,
            notifications,
            clock,
            config,
        }
    }

    /// Repositories underneath
    #[inline]
    #[must_use]
    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    /// Attach a file to the owner's document of the requested type and dose
    ///
    /// The file is stored first. An existing document gets the new link and
    /// goes back to `Sin revisar`, and its previous file is then deleted on a
    /// best-effort basis; otherwise a new document row is created.
    ///
    /// # Errors
    /// `UnsupportedMimeType`, `UnknownDocumentType`, `DoseOutOfRange`,
    /// file store and store failures.
    pub async fn upload(&self, request: UploadRequest) -> Result<DocumentInstance> {
        if !self.config.accepts_mime_type(&request.mime_type) {
            return Err(LifecycleError::UnsupportedMimeType(request.mime_type));
        }
        let doc_type = self
            .repos
            .document_types
            .find_by_id(&request.type_id)
            .await?
            .ok_or_else(|| LifecycleError::UnknownDocumentType(request.type_id.clone()))?;
        let dose = request.dose.unwrap_or(1);
        if !doc_type.accepts_dose(dose) {
            return Err(LifecycleError::DoseOutOfRange {
                type_id: doc_type.id,
                dose,
                max: doc_type.doses.max(1),
            });
        }

        let existing = self
            .repos
            .documents
            .find_document_instance(&request.owner_id, &doc_type.id, Some(dose))
            .await?;

        let today = self.clock.today();
        let name = stored_file_name(&doc_type, &request, self.clock.now().timestamp_millis());
        let stored = self
            .files
            .upload_file(&request.owner_id, &name, &request.mime_type, request.content)
            .await?;
        debug!(owner_id = %request.owner_id, file_id = %stored.id, "file stored");

        let written: Result<DocumentInstance> = match existing {
            Some(previous) => self.attach_file(previous, &stored, request.issued_on, today).await,
            None => {
                let mut document = DocumentInstance::uploaded(
                    Uuid::new_v4().to_string(),
                    &request.owner_id,
                    &doc_type.id,
                    &doc_type.name,
                    dose,
                    today,
                );
                document.issued_on = request.issued_on;
                document.file_ref.clone_from(&stored.url);
                self.repos.documents.create(&document).await.map_err(Into::into)
            }
        };
        match written {
            Ok(document) => {
                info!(
                    document_id = %document.id,
                    owner_id = %document.owner_id,
                    type_id = %document.type_id,
                    dose,
                    "document uploaded"
                );
                Ok(document)
            }
            Err(err) => {
                if let Err(delete_err) = self.files.delete_file(&stored.id).await {
                    warn!(
                        file_id = %stored.id,
                        error = %delete_err,
                        "could not delete file of failed upload"
                    );
                }
                Err(err)
            }
        }
    }

    /// Point `previous` at a freshly stored file and reset its review
    async fn attach_file(
        &self,
        previous: DocumentInstance,
        stored: &StoredFile,
        issued_on: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<DocumentInstance> {
        let status = validate_transition(previous.status, Trigger::Upload)?;
        let patch = status_patch(status, None)
            .with(columns::FILE, &stored.url)
            .with(columns::UPLOADED_ON, format_date(Some(today)))
            .with(columns::ISSUED_ON, format_date(issued_on))
            .with(columns::EXPIRES_ON, "")
            .with(columns::COMMENT, "");
        let updated = self
            .repos
            .documents
            .patch(&previous.id, &patch)
            .await?
            .ok_or_else(|| LifecycleError::DocumentNotFound(previous.id.clone()))?;
        debug!(document_id = %updated.id, from = %previous.status, "previous upload replaced");

        self.discard_file(&previous.file_ref).await;
        Ok(updated)
    }

    async fn discard_file(&self, file_ref: &str) {
        let Some(file_id) = file_id_from_url(file_ref) else {
            if !file_ref.trim().is_empty() {
                debug!(file_ref, "previous file link has no file id");
            }
            return;
        };
        if let Err(err) = self.files.delete_file(file_id).await {
            warn!(file_id, error = %err, "could not delete replaced file");
        }
    }

    /// Record a review outcome for one document
    ///
    /// Approving a document of an expiring type also writes its expiration
    /// date. The owner is notified without waiting for delivery.
    ///
    /// # Errors
    /// `DocumentNotFound`, `InvalidTransition`, store failures.
    pub async fn review(
        &self,
        id: &str,
        status: DocumentStatus,
        comment: Option<String>,
    ) -> Result<DocumentInstance> {
        let document = self
            .repos
            .documents
            .find_by_id(id)
            .await?
            .ok_or_else(|| LifecycleError::DocumentNotFound(id.to_string()))?;
        let to = validate_transition(document.status, Trigger::Review(status))?;
        let doc_type = if to == DocumentStatus::Cumplido {
            self.repos.document_types.find_by_id(&document.type_id).await?
        } else {
            None
        };

        let today = self.clock.today();
        let patch = review_patch(&document, doc_type.as_ref(), to, comment.as_deref(), today);
        let updated = self
            .repos
            .documents
            .patch(id, &patch)
            .await?
            .ok_or_else(|| LifecycleError::DocumentNotFound(id.to_string()))?;
        info!(document_id = id, from = %document.status, to = %to, "document reviewed");

        if self.config.notify_on_review {
            self.notifications.status_changed(
                &updated.owner_id,
                &updated.type_name,
                to,
                today,
                &updated.comment,
            );
        }
        Ok(updated)
    }

    /// Apply several review outcomes in one batch write
    ///
    /// Every entry is validated before anything is written; ids with no
    /// document are reported in [`BatchOutcome::missing`].
    ///
    /// # Errors
    /// `InvalidTransition` for the first invalid entry, store failures.
    pub async fn review_batch(&self, reviews: Vec<ReviewUpdate>) -> Result<BatchOutcome> {
        if reviews.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let documents: HashMap<String, DocumentInstance> = self
            .repos
            .documents
            .get_all()
            .await?
            .into_iter()
            .map(|doc| (doc.id.clone(), doc))
            .collect();
        let types = self.type_catalogue().await?;
        let today = self.clock.today();

        let mut missing = Vec::new();
        let mut patches = Vec::with_capacity(reviews.len());
        let mut notices = Vec::new();
        for review in reviews {
            let Some(document) = documents.get(&review.id) else {
                missing.push(review.id);
                continue;
            };
            let to = validate_transition(document.status, Trigger::Review(review.status))?;
            let patch = review_patch(
                document,
                types.get(&document.type_id),
                to,
                review.comment.as_deref(),
                today,
            );
            notices.push((document.id.clone(), to, patch.text(columns::COMMENT).to_string()));
            patches.push((review.id, patch));
        }

        let mut outcome = self.repos.documents.update_many(patches).await?;
        outcome.missing.extend(missing);

        if self.config.notify_on_review {
            for (id, to, comment) in notices {
                if !outcome.updated.contains(&id) {
                    continue;
                }
                if let Some(document) = documents.get(&id) {
                    self.notifications.status_changed(
                        &document.owner_id,
                        &document.type_name,
                        to,
                        today,
                        &comment,
                    );
                }
            }
        }
        info!(
            updated = outcome.updated.len(),
            missing = outcome.missing.len(),
            "batch review applied"
        );
        Ok(outcome)
    }

    /// Every document of `owner_id`, with its type
    ///
    /// # Errors
    /// Store failures.
    pub async fn documents_for_user(&self, owner_id: &str) -> Result<Vec<DocumentView>> {
        let documents = self.repos.documents.find_by_owner(owner_id).await?;
        self.join_types(documents).await
    }

    /// Documents waiting for review, with their type
    ///
    /// # Errors
    /// Store failures.
    pub async fn pending_documents(&self) -> Result<Vec<DocumentView>> {
        let documents = self
            .repos
            .documents
            .find_by_status(DocumentStatus::SinRevisar)
            .await?;
        self.join_types(documents).await
    }

    /// Count documents per status
    ///
    /// Reads raw rows so that statuses this build does not know are counted
    /// under [`Statistics::unexpected`] instead of being dropped.
    ///
    /// # Errors
    /// Store failures.
    pub async fn statistics(&self) -> Result<Statistics> {
        let rows = self.repos.documents.raw_records().await?;
        let mut stats = Statistics {
            total: rows.len(),
            by_status: DocumentStatus::ALL.into_iter().map(|status| (status, 0)).collect(),
            unexpected: BTreeMap::new(),
        };
        for row in &rows {
            let text = row.text(columns::STATUS);
            match DocumentStatus::parse(text) {
                Some(status) => *stats.by_status.entry(status).or_default() += 1,
                None => *stats.unexpected.entry(text.trim().to_string()).or_default() += 1,
            }
        }
        if !stats.unexpected.is_empty() {
            warn!(unexpected = ?stats.unexpected, "documents with unrecognised status");
        }
        Ok(stats)
    }

    /// Run the expiration sweep for today
    ///
    /// # Errors
    /// Store failures.
    pub async fn sweep_expired(&self) -> Result<SweepReport> {
        let mut sweep = ExpirationSweep::new(self.repos.clone());
        if self.config.notify_on_expiry {
            sweep = sweep.with_notifications(self.notifications.clone());
        }
        sweep.run(self.clock.today()).await
    }

    async fn type_catalogue(&self) -> Result<HashMap<String, DocumentType>> {
        Ok(self
            .repos
            .document_types
            .get_all()
            .await?
            .into_iter()
            .map(|doc_type| (doc_type.id.clone(), doc_type))
            .collect())
    }

    async fn join_types(&self, documents: Vec<DocumentInstance>) -> Result<Vec<DocumentView>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let types = self.type_catalogue().await?;
        Ok(documents
            .into_iter()
            .map(|document| {
                let document_type = types
                    .get(&document.type_id)
                    .cloned()
                    .unwrap_or_else(|| DocumentType::unknown(&document.type_id));
                DocumentView {
                    document,
                    document_type,
                }
            })
            .collect())
    }
}

/// Columns written by a review to status `to`
fn review_patch(
    document: &DocumentInstance,
    doc_type: Option<&DocumentType>,
    to: DocumentStatus,
    comment: Option<&str>,
    today: NaiveDate,
) -> Record {
    let mut patch = status_patch(to, Some(today));
    if let Some(comment) = comment {
        patch.insert(columns::COMMENT, comment.trim());
    }
    if to == DocumentStatus::Cumplido {
        let expires_on = doc_type
            .zip(document.uploaded_on)
            .and_then(|(doc_type, uploaded_on)| expiration_date(doc_type, uploaded_on));
        if expires_on.is_some() {
            patch.insert(columns::EXPIRES_ON, format_date(expires_on));
        }
    }
    patch
}

/// `<type>_<owner>_<millis>.<ext>`
fn stored_file_name(doc_type: &DocumentType, request: &UploadRequest, millis: i64) -> String {
    let type_part: String = doc_type
        .name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let type_part = if type_part.is_empty() { doc_type.id.as_str() } else { type_part.as_str() };
    let extension = Path::new(&request.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .or_else(|| extension_for(&request.mime_type).map(str::to_string))
        .unwrap_or_else(|| "bin".to_string());
    format!("{type_part}_{owner}_{millis}.{extension}", owner = request.owner_id)
}

fn extension_for(mime_type: &str) -> Option<&'static str> {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "application/pdf" => Some("pdf"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some("xlsx"),
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}
