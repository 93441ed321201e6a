//! Upload, review and expiration against the in-memory store

use pretty_assertions::assert_eq;
use std::sync::Arc;
use tabula_codec::SheetRecord;
use tabula_entities::user_documents::columns;
use tabula_entities::{DocumentInstance, DocumentStatus};
use tabula_lifecycle::{
    DocumentService, ExpirationSweep, LifecycleConfig, LifecycleError, Notifications,
    ReviewUpdate, UploadRequest,
};
use tabula_repository::StoreError;
use tabula_test_utils::{
    approved_document, date, document_types, insert_entity, repositories, seeded_store,
    FixedClock, InMemoryStore, MemoryFileStore, RecordingNotifier, StoreOp,
};

struct Harness {
    store: Arc<InMemoryStore>,
    files: Arc<MemoryFileStore>,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<FixedClock>,
    service: DocumentService,
}

fn harness() -> Harness {
    let store = seeded_store();
    let files = Arc::new(MemoryFileStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let clock = Arc::new(FixedClock::new(date(2024, 1, 1)));
    let service = DocumentService::new(
        repositories(&store),
        files.clone(),
        notifier.clone(),
        clock.clone(),
        LifecycleConfig::default(),
    );
    Harness {
        store,
        files,
        notifier,
        clock,
        service,
    }
}

fn upload(owner_id: &str, type_id: &str, dose: Option<u32>) -> UploadRequest {
    UploadRequest {
        owner_id: owner_id.to_string(),
        type_id: type_id.to_string(),
        dose,
        file_name: "soporte.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        content: vec![0x25, 0x50, 0x44, 0x46],
        issued_on: Some(date(2023, 12, 20)),
    }
}

fn document_status(store: &InMemoryStore, id: &str) -> String {
    let position = DocumentInstance::FIELDS
        .iter()
        .position(|field| *field == columns::STATUS)
        .unwrap();
    store
        .rows(DocumentInstance::TABLE)
        .into_iter()
        .find(|row| row.first().map(String::as_str) == Some(id))
        .and_then(|row| row.get(position).cloned())
        .unwrap_or_default()
}

#[tokio::test]
async fn approval_expires_once_its_window_has_passed() {
    let store = seeded_store();
    let hepatitis = &document_types()[1];
    insert_entity(&*store, &approved_document("d-1", "u-1", hepatitis, date(2024, 1, 1)));
    let sweep = ExpirationSweep::new(repositories(&store));

    let report = sweep.run(date(2024, 1, 30)).await.unwrap();
    assert_eq!(report.expired, 0);
    assert_eq!(report.total, 1);
    assert_eq!(document_status(&store, "d-1"), "Cumplido");

    let report = sweep.run(date(2024, 2, 1)).await.unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(report.expired_ids, vec!["d-1".to_string()]);
    assert_eq!(document_status(&store, "d-1"), "Expirado");
}

#[tokio::test]
async fn sweeping_twice_changes_nothing_more() {
    let store = seeded_store();
    let types = document_types();
    insert_entity(&*store, &approved_document("d-1", "u-1", &types[1], date(2023, 1, 1)));
    insert_entity(&*store, &approved_document("d-2", "u-2", &types[0], date(2020, 1, 1)));
    insert_entity(&*store, &approved_document("d-3", "u-2", &types[2], date(2023, 6, 1)));
    let sweep = ExpirationSweep::new(repositories(&store));
    let today = date(2024, 7, 1);

    let first = sweep.run(today).await.unwrap();
    let after_first = store.rows(DocumentInstance::TABLE);
    let second = sweep.run(today).await.unwrap();

    assert_eq!(first.expired_ids, vec!["d-1".to_string(), "d-3".to_string()]);
    assert_eq!(second.expired, 0);
    assert_eq!(store.rows(DocumentInstance::TABLE), after_first);
    assert_eq!(document_status(&store, "d-2"), "Cumplido");
}

#[tokio::test]
async fn sweep_notifies_owners() {
    let store = seeded_store();
    let approved = approved_document("d-1", "u-1", &document_types()[1], date(2024, 1, 1));
    insert_entity(&*store, &approved);
    let repos = repositories(&store);
    let notifier = Arc::new(RecordingNotifier::new());
    let sweep = ExpirationSweep::new(repos.clone())
        .with_notifications(Notifications::new(notifier.clone(), repos.users.clone()));

    sweep.run(date(2024, 3, 1)).await.unwrap();

    assert!(notifier.wait_for(1).await);
    let sent = notifier.sent();
    assert_eq!(sent[0].to, "ana@correounivalle.edu.co");
    assert_eq!(sent[0].subject, "⚠️ Notificación: Hepatitis B - Expirado");
}

#[tokio::test]
async fn reupload_resets_review_and_replaces_the_file() {
    let h = harness();
    let first = h.service.upload(upload("u-1", "7", Some(1))).await.unwrap();
    h.service
        .review(&first.id, DocumentStatus::Rechazado, Some("Ilegible".to_string()))
        .await
        .unwrap();
    assert!(h.notifier.wait_for(1).await);

    h.clock.advance_days(3);
    let second = h.service.upload(upload("u-1", "7", Some(1))).await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.status, DocumentStatus::SinRevisar);
    assert!(!second.reviewed);
    assert_eq!(second.comment, "");
    assert_eq!(second.uploaded_on, Some(date(2024, 1, 4)));
    assert_ne!(second.file_ref, first.file_ref);
    assert_eq!(h.store.rows(DocumentInstance::TABLE).len(), 1);
    assert_eq!(h.files.deleted(), vec!["file-1".to_string()]);
    assert_eq!(h.files.files().len(), 1);
}

#[tokio::test]
async fn each_dose_is_its_own_document() {
    let h = harness();
    let first = h.service.upload(upload("u-1", "7", Some(1))).await.unwrap();
    let second = h.service.upload(upload("u-1", "7", Some(2))).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(h.store.rows(DocumentInstance::TABLE).len(), 2);
    assert!(h.files.deleted().is_empty());
}

#[tokio::test]
async fn failed_file_deletion_does_not_fail_the_upload() {
    let h = harness();
    h.service.upload(upload("u-1", "1", None)).await.unwrap();
    h.files.fail_deletes(true);

    let again = h.service.upload(upload("u-1", "1", None)).await.unwrap();
    assert_eq!(again.status, DocumentStatus::SinRevisar);
}

#[tokio::test]
async fn rejected_upload_writes_no_row() {
    let h = harness();
    h.files.reject_uploads(true);

    let err = h.service.upload(upload("u-1", "1", None)).await.unwrap_err();
    assert!(matches!(err, LifecycleError::FileStore(_)));
    assert!(h.store.rows(DocumentInstance::TABLE).is_empty());
}

#[tokio::test]
async fn failed_row_write_removes_the_new_file() {
    let h = harness();
    h.store.fail_next(StoreOp::AppendRow, StoreError::remote(403, "forbidden"));

    let err = h.service.upload(upload("u-1", "1", None)).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Repository(_)));
    assert!(h.store.rows(DocumentInstance::TABLE).is_empty());
    assert_eq!(h.files.deleted(), vec!["file-1".to_string()]);
    assert!(h.files.files().is_empty());
}

#[tokio::test]
async fn failed_reupload_keeps_the_previous_file() {
    let h = harness();
    let first = h.service.upload(upload("u-1", "1", None)).await.unwrap();
    h.store.fail_next(StoreOp::UpdateRange, StoreError::remote(403, "forbidden"));

    assert!(h.service.upload(upload("u-1", "1", None)).await.is_err());
    assert_eq!(h.files.deleted(), vec!["file-2".to_string()]);
    let remaining: Vec<String> = h.files.files().into_iter().map(|file| file.id).collect();
    assert_eq!(remaining, vec!["file-1".to_string()]);
    assert_eq!(document_status(&h.store, &first.id), "Sin revisar");
}

#[tokio::test]
async fn stored_file_name_follows_the_clock() {
    let h = harness();
    h.service.upload(upload("u-2", "7", Some(1))).await.unwrap();
    assert_eq!(h.files.files()[0].name, "Hepatitis_B_u-2_1704067200000.pdf");
}

#[tokio::test]
async fn approving_an_expiring_type_records_its_expiration() {
    let h = harness();
    let doc = h.service.upload(upload("u-2", "12", None)).await.unwrap();

    h.clock.advance_days(2);
    let approved = h.service.review(&doc.id, DocumentStatus::Cumplido, None).await.unwrap();

    assert_eq!(approved.status, DocumentStatus::Cumplido);
    assert!(approved.reviewed);
    assert_eq!(approved.reviewed_on, Some(date(2024, 1, 3)));
    assert_eq!(approved.expires_on, Some(date(2024, 12, 31)));

    assert!(h.notifier.wait_for(1).await);
    let sent = h.notifier.sent();
    assert_eq!(sent[0].to, "luis@correounivalle.edu.co");
    assert_eq!(sent[0].subject, "Notificación: Póliza de seguro - Cumplido");
}

#[tokio::test]
async fn review_failures() {
    let h = harness();
    let err = h
        .service
        .review("missing", DocumentStatus::Cumplido, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::DocumentNotFound(_)));

    let doc = h.service.upload(upload("u-1", "1", None)).await.unwrap();
    let err = h
        .service
        .review(&doc.id, DocumentStatus::SinRevisar, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    assert_eq!(document_status(&h.store, &doc.id), "Sin revisar");
}

#[tokio::test]
async fn undelivered_notification_does_not_fail_review() {
    let h = harness();
    h.notifier.fail_deliveries(true);
    let doc = h.service.upload(upload("u-1", "1", None)).await.unwrap();

    let reviewed = h.service.review(&doc.id, DocumentStatus::NoAplica, None).await.unwrap();
    assert_eq!(reviewed.status, DocumentStatus::NoAplica);
    assert!(h.notifier.wait_for(1).await);
}

#[tokio::test]
async fn batch_review_writes_once() {
    let h = harness();
    let a = h.service.upload(upload("u-1", "1", None)).await.unwrap();
    let b = h.service.upload(upload("u-2", "1", None)).await.unwrap();
    let writes_before = h.store.writes();

    let outcome = h
        .service
        .review_batch(vec![
            ReviewUpdate {
                id: a.id.clone(),
                status: DocumentStatus::Cumplido,
                comment: None,
            },
            ReviewUpdate {
                id: "ghost".to_string(),
                status: DocumentStatus::Cumplido,
                comment: None,
            },
            ReviewUpdate {
                id: b.id.clone(),
                status: DocumentStatus::Rechazado,
                comment: Some("Vencido".to_string()),
            },
        ])
        .await
        .unwrap();

    assert_eq!(outcome.updated, vec![a.id.clone(), b.id.clone()]);
    assert_eq!(outcome.missing, vec!["ghost".to_string()]);
    assert_eq!(h.store.writes(), writes_before + 1);
    assert_eq!(document_status(&h.store, &a.id), "Cumplido");
    assert_eq!(document_status(&h.store, &b.id), "Rechazado");
    assert!(h.notifier.wait_for(2).await);
}

#[tokio::test]
async fn invalid_batch_entry_writes_nothing() {
    let h = harness();
    let a = h.service.upload(upload("u-1", "1", None)).await.unwrap();
    let writes_before = h.store.writes();

    let err = h
        .service
        .review_batch(vec![ReviewUpdate {
            id: a.id,
            status: DocumentStatus::SinRevisar,
            comment: None,
        }])
        .await
        .unwrap_err();
    assert!(err.is_rejected());
    assert_eq!(h.store.writes(), writes_before);
}

#[tokio::test]
async fn listings_join_the_catalogue() {
    let h = harness();
    h.service.upload(upload("u-1", "1", None)).await.unwrap();
    let approved = h.service.upload(upload("u-1", "7", Some(1))).await.unwrap();
    h.service.review(&approved.id, DocumentStatus::Cumplido, None).await.unwrap();
    let mut orphan = approved_document("d-x", "u-1", &document_types()[0], date(2024, 1, 1));
    orphan.type_id = "99".to_string();
    orphan.status = DocumentStatus::SinRevisar;
    insert_entity(&*h.store, &orphan);

    let mine = h.service.documents_for_user("u-1").await.unwrap();
    assert_eq!(mine.len(), 3);
    assert_eq!(mine[1].document_type.name, "Hepatitis B");
    assert_eq!(mine[1].expires_on(), Some(date(2024, 1, 31)));

    let pending = h.service.pending_documents().await.unwrap();
    let names: Vec<_> = pending.iter().map(|view| view.document_type.name.as_str()).collect();
    assert_eq!(names, vec!["Carné estudiantil", "Desconocido"]);

    assert!(h.service.documents_for_user("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn statistics_count_unknown_labels_separately() {
    let h = harness();
    let doc = h.service.upload(upload("u-1", "1", None)).await.unwrap();
    h.service.upload(upload("u-2", "1", None)).await.unwrap();
    h.service.review(&doc.id, DocumentStatus::Cumplido, None).await.unwrap();
    let mut legacy = approved_document("d-9", "u-2", &document_types()[2], date(2023, 1, 1));
    legacy.status = DocumentStatus::Cumplido;
    insert_entity(&*h.store, &legacy);
    let mut row: Vec<String> = DocumentInstance::FIELDS.iter().map(|_| String::new()).collect();
    row[0] = "d-10".to_string();
    row[10] = "Archivado".to_string();
    h.store.insert_row(DocumentInstance::TABLE, &row);

    let stats = h.service.statistics().await.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.count(DocumentStatus::Cumplido), 2);
    assert_eq!(stats.count(DocumentStatus::SinRevisar), 1);
    assert_eq!(stats.count(DocumentStatus::Expirado), 0);
    assert_eq!(stats.unexpected.get("Archivado"), Some(&1));
}

#[tokio::test]
async fn service_sweep_uses_the_clock() {
    let h = harness();
    let doc = h.service.upload(upload("u-1", "7", Some(1))).await.unwrap();
    h.service.review(&doc.id, DocumentStatus::Cumplido, None).await.unwrap();

    h.clock.advance_days(29);
    assert_eq!(h.service.sweep_expired().await.unwrap().expired, 0);
    h.clock.advance_days(2);
    assert_eq!(h.service.sweep_expired().await.unwrap().expired, 1);
    assert_eq!(document_status(&h.store, &doc.id), "Expirado");
}
