//! `DOCUMENTOS_USUARIOS` table: uploaded documents and their review state

use crate::status::DocumentStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tabula_codec::cell::{format_date, format_flag, parse_date, parse_flag, parse_number, FlagStyle};
use tabula_codec::{CodecError, Record, SheetRecord};
use tabula_repository::{
    BatchOutcome, EntityRepository, RepositoryConfig, StoreScheduler, TabularStore,
};

/// Column names of `DOCUMENTOS_USUARIOS`
pub mod columns {
    /// Identity
    pub const ID: &str = "id_usuarioDoc";
    /// Owner (`USUARIOS.id_usuario`)
    pub const OWNER: &str = "id_persona";
    /// Type (`DOCUMENTOS.id_doc`)
    pub const TYPE_ID: &str = "id_doc";
    /// Type name, denormalised
    pub const TYPE_NAME: &str = "nombre_doc";
    /// Dose number, 1 for single-dose types
    pub const DOSE: &str = "numero_dosis";
    /// Upload date
    pub const UPLOADED_ON: &str = "fecha_cargue";
    /// Issue date printed on the document
    pub const ISSUED_ON: &str = "fecha_expedicion";
    /// Expiration date, set when an expiring type is approved
    pub const EXPIRES_ON: &str = "fecha_vencimiento";
    /// Reviewed flag (`1`/`0`)
    pub const REVIEWED: &str = "revision";
    /// Review date
    pub const REVIEWED_ON: &str = "fecha_revision";
    /// Review status
    pub const STATUS: &str = "estado";
    /// Link to the stored file
    pub const FILE: &str = "ruta_archivo";
    /// Reviewer comment
    pub const COMMENT: &str = "comentario";
}

/// One uploaded document of one owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInstance {
    /// `id_usuarioDoc`
    pub id: String,
    /// `id_persona`
    pub owner_id: String,
    /// `id_doc`
    pub type_id: String,
    /// `nombre_doc`
    pub type_name: String,
    /// `numero_dosis`
    pub dose: u32,
    /// `fecha_cargue`
    pub uploaded_on: Option<NaiveDate>,
    /// `fecha_expedicion`
    pub issued_on: Option<NaiveDate>,
    /// `fecha_vencimiento`
    pub expires_on: Option<NaiveDate>,
    /// `revision`
    pub reviewed: bool,
    /// `fecha_revision`
    pub reviewed_on: Option<NaiveDate>,
    /// `estado`
    pub status: DocumentStatus,
    /// `ruta_archivo`
    pub file_ref: String,
    /// `comentario`
    pub comment: String,
}

impl DocumentInstance {
    /// Fresh, unreviewed upload
    #[must_use]
    pub fn uploaded(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        type_id: impl Into<String>,
        type_name: impl Into<String>,
        dose: u32,
        uploaded_on: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            type_id: type_id.into(),
            type_name: type_name.into(),
            dose,
            uploaded_on: Some(uploaded_on),
            issued_on: None,
            expires_on: None,
            reviewed: false,
            reviewed_on: None,
            status: DocumentStatus::SinRevisar,
            file_ref: String::new(),
            comment: String::new(),
        }
    }

    /// Waiting for review
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == DocumentStatus::SinRevisar
    }
}

impl SheetRecord for DocumentInstance {
    const TABLE: &'static str = "DOCUMENTOS_USUARIOS";
    const FIELDS: &'static [&'static str] = &[
        columns::ID,
        columns::OWNER,
        columns::TYPE_ID,
        columns::TYPE_NAME,
        columns::DOSE,
        columns::UPLOADED_ON,
        columns::ISSUED_ON,
        columns::EXPIRES_ON,
        columns::REVIEWED,
        columns::REVIEWED_ON,
        columns::STATUS,
        columns::FILE,
        columns::COMMENT,
    ];
    const ID_FIELD: &'static str = columns::ID;

    fn id(&self) -> &str {
        &self.id
    }

    fn to_record(&self) -> Record {
        Record::with_capacity(Self::FIELDS.len())
            .with(columns::ID, &self.id)
            .with(columns::OWNER, &self.owner_id)
            .with(columns::TYPE_ID, &self.type_id)
            .with(columns::TYPE_NAME, &self.type_name)
            .with(columns::DOSE, self.dose)
            .with(columns::UPLOADED_ON, format_date(self.uploaded_on))
            .with(columns::ISSUED_ON, format_date(self.issued_on))
            .with(columns::EXPIRES_ON, format_date(self.expires_on))
            .with(columns::REVIEWED, format_flag(self.reviewed, FlagStyle::Digit))
            .with(columns::REVIEWED_ON, format_date(self.reviewed_on))
            .with(columns::STATUS, self.status)
            .with(columns::FILE, &self.file_ref)
            .with(columns::COMMENT, &self.comment)
    }

    fn from_record(record: &Record) -> Result<Self, CodecError> {
        let status_text = record.text(columns::STATUS);
        let status = DocumentStatus::parse(status_text)
            .ok_or_else(|| CodecError::invalid(columns::STATUS, status_text, "document status"))?;

        Ok(Self {
            id: record.require(columns::ID)?.to_string(),
            owner_id: record.text(columns::OWNER).to_string(),
            type_id: record.text(columns::TYPE_ID).to_string(),
            type_name: record.text(columns::TYPE_NAME).to_string(),
            dose: parse_number(columns::DOSE, record.text(columns::DOSE), 1)?,
            uploaded_on: parse_date(columns::UPLOADED_ON, record.text(columns::UPLOADED_ON))?,
            issued_on: parse_date(columns::ISSUED_ON, record.text(columns::ISSUED_ON))?,
            expires_on: parse_date(columns::EXPIRES_ON, record.text(columns::EXPIRES_ON))?,
            reviewed: parse_flag(columns::REVIEWED, record.text(columns::REVIEWED))?,
            reviewed_on: parse_date(columns::REVIEWED_ON, record.text(columns::REVIEWED_ON))?,
            status,
            file_ref: record.text(columns::FILE).to_string(),
            comment: record.text(columns::COMMENT).to_string(),
        })
    }
}

/// Patch setting the review columns
#[must_use]
pub fn status_patch(status: DocumentStatus, reviewed_on: Option<NaiveDate>) -> Record {
    Record::new()
        .with(columns::STATUS, status)
        .with(columns::REVIEWED, format_flag(reviewed_on.is_some(), FlagStyle::Digit))
        .with(columns::REVIEWED_ON, format_date(reviewed_on))
}

/// Repository over `DOCUMENTOS_USUARIOS`
#[derive(Debug, Clone)]
pub struct UserDocumentsRepository {
    inner: EntityRepository<DocumentInstance>,
}

impl UserDocumentsRepository {
    /// Create the repository
    ///
    /// # Errors
    /// `SchemaMismatch` if the table layout is invalid.
    pub fn new(
        store: Arc<dyn TabularStore>,
        scheduler: StoreScheduler,
        config: RepositoryConfig,
    ) -> tabula_repository::Result<Self> {
        Ok(Self {
            inner: EntityRepository::new(store, scheduler, config)?,
        })
    }

    /// Typed repository underneath
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &EntityRepository<DocumentInstance> {
        &self.inner
    }

    /// Raw rows, including ones whose status does not parse
    ///
    /// # Errors
    /// Store failures.
    pub async fn raw_records(&self) -> tabula_repository::Result<Vec<Record>> {
        self.inner.raw().get_all().await
    }

    /// Every document
    ///
    /// # Errors
    /// Store failures.
    pub async fn get_all(&self) -> tabula_repository::Result<Vec<DocumentInstance>> {
        self.inner.get_all().await
    }

    /// Document with id `id`
    ///
    /// # Errors
    /// Store failures.
    pub async fn find_by_id(
        &self,
        id: &str,
    ) -> tabula_repository::Result<Option<DocumentInstance>> {
        self.inner.find_by_id(id).await
    }

    /// Documents of `owner_id`
    ///
    /// # Errors
    /// Store failures.
    pub async fn find_by_owner(
        &self,
        owner_id: &str,
    ) -> tabula_repository::Result<Vec<DocumentInstance>> {
        self.inner.find_by(columns::OWNER, owner_id).await
    }

    /// Documents of type `type_id`
    ///
    /// # Errors
    /// Store failures.
    pub async fn find_by_type(
        &self,
        type_id: &str,
    ) -> tabula_repository::Result<Vec<DocumentInstance>> {
        self.inner.find_by(columns::TYPE_ID, type_id).await
    }

    /// Documents in `status`, legacy labels included
    ///
    /// # Errors
    /// Store failures.
    pub async fn find_by_status(
        &self,
        status: DocumentStatus,
    ) -> tabula_repository::Result<Vec<DocumentInstance>> {
        let all = self.inner.get_all().await?;
        Ok(all.into_iter().filter(|doc| doc.status == status).collect())
    }

    /// The document of `owner_id` for `type_id`, and `dose` when given
    ///
    /// First match in row order.
    ///
    /// # Errors
    /// Store failures.
    pub async fn find_document_instance(
        &self,
        owner_id: &str,
        type_id: &str,
        dose: Option<u32>,
    ) -> tabula_repository::Result<Option<DocumentInstance>> {
        let owned = self.find_by_owner(owner_id).await?;
        Ok(owned
            .into_iter()
            .find(|doc| doc.type_id == type_id && dose.map_or(true, |dose| doc.dose == dose)))
    }

    /// Append `document`
    ///
    /// # Errors
    /// `CreateFailed`, store failures.
    pub async fn create(
        &self,
        document: &DocumentInstance,
    ) -> tabula_repository::Result<DocumentInstance> {
        self.inner.create(document).await
    }

    /// Merge `patch` into the document with id `id`
    ///
    /// # Errors
    /// `SchemaMismatch` for unknown columns, store failures.
    pub async fn patch(
        &self,
        id: &str,
        patch: &Record,
    ) -> tabula_repository::Result<Option<DocumentInstance>> {
        self.inner.patch(id, patch).await
    }

    /// Set the status; `reviewed_on` also sets the reviewed flag and date
    ///
    /// # Errors
    /// Store failures.
    pub async fn set_status(
        &self,
        id: &str,
        status: DocumentStatus,
        reviewed_on: Option<NaiveDate>,
    ) -> tabula_repository::Result<Option<DocumentInstance>> {
        self.inner.patch(id, &status_patch(status, reviewed_on)).await
    }

    /// Patch several documents in one batch write
    ///
    /// # Errors
    /// `SchemaMismatch` for unknown columns, store failures.
    pub async fn update_many(
        &self,
        updates: Vec<(String, Record)>,
    ) -> tabula_repository::Result<BatchOutcome> {
        self.inner.update_many(updates).await
    }
}
