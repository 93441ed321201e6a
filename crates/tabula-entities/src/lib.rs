//! Tabula Entities - the three tables of the document tracker
//!
//! - `USUARIOS`: people who upload documents ([`User`])
//! - `DOCUMENTOS`: required document types ([`DocumentType`])
//! - `DOCUMENTOS_USUARIOS`: one uploaded document per owner, type and dose
//!   ([`DocumentInstance`])
//!
//! Each entity is a [`SheetRecord`](tabula_codec::SheetRecord); each
//! repository wraps an [`EntityRepository`](tabula_repository::EntityRepository)
//! with the lookups the lifecycle needs.

pub mod document_types;
pub mod status;
pub mod user_documents;
pub mod users;

pub use document_types::{DocumentType, DocumentTypesRepository};
pub use status::{DocumentStatus, UnknownStatus};
pub use user_documents::{DocumentInstance, UserDocumentsRepository};
pub use users::{Role, User, UsersRepository};

use std::sync::Arc;
use tabula_repository::{RepositoryConfig, StoreScheduler, TabularStore};

/// The three repositories over one store and one scheduler
#[derive(Debug, Clone)]
pub struct Repositories {
    /// `USUARIOS`
    pub users: UsersRepository,
    /// `DOCUMENTOS`
    pub document_types: DocumentTypesRepository,
    /// `DOCUMENTOS_USUARIOS`
    pub documents: UserDocumentsRepository,
}

impl Repositories {
    /// Build all repositories sharing `store` and `scheduler`
    ///
    /// # Errors
    /// `SchemaMismatch` if an entity layout is invalid.
    pub fn new(
        store: &Arc<dyn TabularStore>,
        scheduler: &StoreScheduler,
        config: &RepositoryConfig,
    ) -> tabula_repository::Result<Self> {
        Ok(Self {
            users: UsersRepository::new(Arc::clone(store), scheduler.clone(), config.clone())?,
            document_types: DocumentTypesRepository::new(
                Arc::clone(store),
                scheduler.clone(),
                config.clone(),
            )?,
            documents: UserDocumentsRepository::new(
                Arc::clone(store),
                scheduler.clone(),
                config.clone(),
            )?,
        })
    }
}
