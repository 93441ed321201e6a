//! `DOCUMENTOS` table: the catalogue of required documents

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tabula_codec::cell::{format_flag, parse_flag, parse_number, FlagStyle};
use tabula_codec::{CodecError, Record, SheetRecord};
use tabula_repository::{EntityRepository, RepositoryConfig, StoreScheduler, TabularStore};

/// Column names of `DOCUMENTOS`
pub mod columns {
    /// Identity
    pub const ID: &str = "id_doc";
    /// Display name
    pub const NAME: &str = "nombre_doc";
    /// Whether approvals expire
    pub const EXPIRES: &str = "vence";
    /// Validity window in days
    pub const VALIDITY_DAYS: &str = "tiempo_vencimiento";
    /// Number of doses (vaccines); 1 for ordinary documents
    pub const DOSES: &str = "dosis";
}

/// Name shown for documents whose type is no longer in the catalogue
pub const UNKNOWN_TYPE_NAME: &str = "Desconocido";

/// A kind of document every user must provide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentType {
    /// `id_doc`
    pub id: String,
    /// `nombre_doc`
    pub name: String,
    /// `vence`
    pub expires: bool,
    /// `tiempo_vencimiento`
    pub validity_days: u32,
    /// `dosis`
    pub doses: u32,
}

impl DocumentType {
    /// Placeholder for a type id missing from the catalogue
    #[must_use]
    pub fn unknown(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: UNKNOWN_TYPE_NAME.to_string(),
            expires: false,
            validity_days: 0,
            doses: 1,
        }
    }

    /// Validity window in days, when approvals of this type expire at all
    #[must_use]
    pub fn validity_window(&self) -> Option<u32> {
        (self.expires && self.validity_days > 0).then_some(self.validity_days)
    }

    /// More than one dose is tracked
    #[inline]
    #[must_use]
    pub fn is_multi_dose(&self) -> bool {
        self.doses > 1
    }

    /// `dose` is within `1..=doses`
    #[inline]
    #[must_use]
    pub fn accepts_dose(&self, dose: u32) -> bool {
        (1..=self.doses.max(1)).contains(&dose)
    }
}

impl SheetRecord for DocumentType {
    const TABLE: &'static str = "DOCUMENTOS";
    const FIELDS: &'static [&'static str] = &[
        columns::ID,
        columns::NAME,
        columns::EXPIRES,
        columns::VALIDITY_DAYS,
        columns::DOSES,
    ];
    const ID_FIELD: &'static str = columns::ID;

    fn id(&self) -> &str {
        &self.id
    }

    fn to_record(&self) -> Record {
        Record::with_capacity(Self::FIELDS.len())
            .with(columns::ID, &self.id)
            .with(columns::NAME, &self.name)
            .with(columns::EXPIRES, format_flag(self.expires, FlagStyle::YesNo))
            .with(columns::VALIDITY_DAYS, self.validity_days)
            .with(columns::DOSES, self.doses)
    }

    fn from_record(record: &Record) -> Result<Self, CodecError> {
        Ok(Self {
            id: record.require(columns::ID)?.to_string(),
            name: record.text(columns::NAME).to_string(),
            expires: parse_flag(columns::EXPIRES, record.text(columns::EXPIRES))?,
            validity_days: parse_number(
                columns::VALIDITY_DAYS,
                record.text(columns::VALIDITY_DAYS),
                0,
            )?,
            doses: parse_number(columns::DOSES, record.text(columns::DOSES), 1)?,
        })
    }
}

/// Repository over `DOCUMENTOS`
#[derive(Debug, Clone)]
pub struct DocumentTypesRepository {
    inner: EntityRepository<DocumentType>,
}

impl DocumentTypesRepository {
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
    pub fn entities(&self) -> &EntityRepository<DocumentType> {
        &self.inner
    }

    /// The whole catalogue
    ///
    /// # Errors
    /// Store failures.
    pub async fn get_all(&self) -> tabula_repository::Result<Vec<DocumentType>> {
        self.inner.get_all().await
    }

    /// Type with id `id`
    ///
    /// # Errors
    /// Store failures.
    pub async fn find_by_id(&self, id: &str) -> tabula_repository::Result<Option<DocumentType>> {
        self.inner.find_by_id(id).await
    }

    /// Type named exactly `name`
    ///
    /// # Errors
    /// Store failures.
    pub async fn find_by_name(
        &self,
        name: &str,
    ) -> tabula_repository::Result<Option<DocumentType>> {
        self.inner.find_one_by(columns::NAME, name).await
    }

    /// Types tracked per dose
    ///
    /// # Errors
    /// Store failures.
    pub async fn multi_dose_types(&self) -> tabula_repository::Result<Vec<DocumentType>> {
        let all = self.inner.get_all().await?;
        Ok(all.into_iter().filter(DocumentType::is_multi_dose).collect())
    }

    /// Whether `id` names a multi-dose type; `false` for unknown ids
    ///
    /// # Errors
    /// Store failures.
    pub async fn is_multi_dose(&self, id: &str) -> tabula_repository::Result<bool> {
        Ok(self
            .find_by_id(id)
            .await?
            .is_some_and(|doc_type| doc_type.is_multi_dose()))
    }
}
