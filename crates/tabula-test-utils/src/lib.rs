//! Testing utilities for the Tabula workspace
//!
//! An in-memory tabular store, fakes for the lifecycle ports, and fixtures
//! with the three document-tracking tables.

#![allow(missing_docs)]

pub mod fakes;
pub mod store;

pub use fakes::{FixedClock, MemoryFileStore, RecordingNotifier, UploadedFile};
pub use store::{InMemoryStore, StoreOp};

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tabula_codec::SheetRecord;
use tabula_entities::{DocumentInstance, DocumentStatus, DocumentType, Repositories, User};
use tabula_repository::{RepositoryConfig, StoreScheduler, TabularStore};
use tabula_scheduler::SchedulerConfig;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn cells(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

/// Scheduler with default delays and no jitter, for paused-time tests
pub fn fast_scheduler() -> StoreScheduler {
    StoreScheduler::new(SchedulerConfig::default().with_jitter(Duration::ZERO))
}

/// Catalogue: a plain ID card, a three-dose vaccine valid 30 days, a yearly policy
pub fn document_types() -> Vec<DocumentType> {
    vec![
        DocumentType {
            id: "1".to_string(),
            name: "Carné estudiantil".to_string(),
            expires: false,
            validity_days: 0,
            doses: 1,
        },
        DocumentType {
            id: "7".to_string(),
            name: "Hepatitis B".to_string(),
            expires: true,
            validity_days: 30,
            doses: 3,
        },
        DocumentType {
            id: "12".to_string(),
            name: "Póliza de seguro".to_string(),
            expires: true,
            validity_days: 365,
            doses: 1,
        },
    ]
}

pub fn sample_user(id: &str, first_name: &str, email: &str) -> User {
    User {
        id: id.to_string(),
        institutional_email: email.to_string(),
        first_name: first_name.to_string(),
        last_name: "Prueba".to_string(),
        ..User::default()
    }
}

/// `Cumplido` document uploaded on `uploaded_on`
pub fn approved_document(
    id: &str,
    owner_id: &str,
    doc_type: &DocumentType,
    uploaded_on: NaiveDate,
) -> DocumentInstance {
    let mut document =
        DocumentInstance::uploaded(id, owner_id, &doc_type.id, &doc_type.name, 1, uploaded_on);
    document.status = DocumentStatus::Cumplido;
    document.reviewed = true;
    document.reviewed_on = Some(uploaded_on);
    document
}

/// Store with the three tables, the catalogue and two users
pub fn seeded_store() -> Arc<InMemoryStore> {
    let store = InMemoryStore::new()
        .with_table(User::TABLE, User::FIELDS)
        .with_table(DocumentType::TABLE, DocumentType::FIELDS)
        .with_table(DocumentInstance::TABLE, DocumentInstance::FIELDS);
    for doc_type in document_types() {
        insert_entity(&store, &doc_type);
    }
    insert_entity(&store, &sample_user("u-1", "Ana", "ana@correounivalle.edu.co"));
    insert_entity(&store, &sample_user("u-2", "Luis", "luis@correounivalle.edu.co"));
    Arc::new(store)
}

/// Write `entity` as a raw row of its table
pub fn insert_entity<T: SheetRecord>(store: &InMemoryStore, entity: &T) {
    let record = entity.to_record();
    let row: Vec<&str> = T::FIELDS.iter().map(|field| record.text(field)).collect();
    store.insert_row(T::TABLE, &row);
}

pub fn repositories(store: &Arc<InMemoryStore>) -> Repositories {
    repositories_with(store, &RepositoryConfig::default())
}

pub fn repositories_with(store: &Arc<InMemoryStore>, config: &RepositoryConfig) -> Repositories {
    let store: Arc<dyn TabularStore> = Arc::clone(store) as Arc<dyn TabularStore>;
    Repositories::new(&store, &fast_scheduler(), config).unwrap()
}
