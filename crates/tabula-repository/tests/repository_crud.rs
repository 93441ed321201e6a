//! CRUD behaviour against the in-memory store

use pretty_assertions::assert_eq;
use std::sync::Arc;
use tabula_codec::{CodecError, Record};
use tabula_repository::{
    RepositoryConfig, RepositoryError, StoreError, StoreScheduler, TabularRepository, TabularStore,
};
use tabula_scheduler::SchedulerMode;
use tabula_test_utils::{cells, fast_scheduler, InMemoryStore, StoreOp};

fn people() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::new().with_table("PEOPLE", &["id", "name", "city"]))
}

fn repository(store: &Arc<InMemoryStore>) -> TabularRepository {
    repository_with(store, fast_scheduler(), RepositoryConfig::default())
}

fn repository_with(
    store: &Arc<InMemoryStore>,
    scheduler: StoreScheduler,
    config: RepositoryConfig,
) -> TabularRepository {
    let store: Arc<dyn TabularStore> = Arc::clone(store) as Arc<dyn TabularStore>;
    TabularRepository::new("PEOPLE", ["id", "name", "city"], store, scheduler, config).unwrap()
}

fn person(id: &str, name: &str) -> Record {
    Record::new().with("id", id).with("name", name).with("city", "")
}

#[tokio::test]
async fn created_record_is_read_back() {
    let store = Arc::new(InMemoryStore::new().with_table("PEOPLE", &["id", "name"]));
    let repo = TabularRepository::new(
        "PEOPLE",
        ["id", "name"],
        Arc::clone(&store) as Arc<dyn TabularStore>,
        fast_scheduler(),
        RepositoryConfig::default(),
    )
    .unwrap();

    let created = repo
        .create(Record::new().with("id", "1").with("name", "Ana"))
        .await
        .unwrap();

    let expected = Record::new().with("id", "1").with("name", "Ana");
    assert_eq!(created, expected);
    assert_eq!(repo.get_all().await.unwrap(), vec![expected]);
    assert_eq!(store.rows("PEOPLE"), vec![cells(&["1", "Ana"])]);
}

#[tokio::test]
async fn empty_table_reads_as_empty() {
    let store = people();
    assert_eq!(repository(&store).get_all().await.unwrap(), Vec::<Record>::new());
    assert_eq!(store.calls(StoreOp::GetRange), 1);
}

#[tokio::test]
async fn update_of_missing_id_writes_nothing() {
    let store = people();
    store.insert_row("PEOPLE", &["1", "Ana", "Cali"]);

    let result = repository(&store)
        .update("id", "2", &Record::new().with("name", "Luis"))
        .await
        .unwrap();

    assert_eq!(result, None);
    assert_eq!(store.writes(), 0);
    assert_eq!(store.rows("PEOPLE"), vec![cells(&["1", "Ana", "Cali"])]);
}

#[tokio::test]
async fn update_merges_into_the_matched_row() {
    let store = people();
    store.insert_row("PEOPLE", &["1", "Ana", "Cali"]);
    store.insert_blank_row("PEOPLE");
    store.insert_row("PEOPLE", &["3", "Luis", "Pasto"]);

    let merged = repository(&store)
        .update("id", "3", &Record::new().with("city", "Palmira"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(merged.text("name"), "Luis");
    assert_eq!(merged.text("city"), "Palmira");
    assert_eq!(
        store.rows("PEOPLE"),
        vec![cells(&["1", "Ana", "Cali"]), Vec::new(), cells(&["3", "Luis", "Palmira"])]
    );
}

#[tokio::test]
async fn blank_rows_are_not_records() {
    let store = people();
    store.insert_blank_row("PEOPLE");
    store.insert_row("PEOPLE", &["2", "Eva"]);

    let all = repository(&store).get_all().await.unwrap();
    assert_eq!(all, vec![person("2", "Eva")]);
}

#[tokio::test]
async fn find_by_matches_exact_text() {
    let store = people();
    store.insert_row("PEOPLE", &["1", "Ana", "Cali"]);
    store.insert_row("PEOPLE", &["2", "Luis", "Cali"]);
    store.insert_row("PEOPLE", &["3", "Eva", "cali"]);
    let repo = repository(&store);

    let found = repo.find_by("city", "Cali").await.unwrap();
    assert_eq!(found.len(), 2);
    let first = repo.find_one_by("city", "cali").await.unwrap().unwrap();
    assert_eq!(first.text("id"), "3");
    assert_eq!(repo.find_one_by("city", "Buga").await.unwrap(), None);
}

#[tokio::test]
async fn unknown_fields_are_schema_mismatches() {
    let store = people();
    let repo = repository(&store);

    let err = repo.find_by("email", "x").await.unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::SchemaMismatch(CodecError::UnknownField(ref f)) if f == "email"
    ));

    let err = repo
        .create(Record::new().with("id", "1").with("email", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::SchemaMismatch(_)));
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn unconfirmed_append_is_create_failed() {
    let store = people();
    store.set_confirm_appends(false);

    let err = repository(&store).create(person("1", "Ana")).await.unwrap_err();
    assert!(matches!(err, RepositoryError::CreateFailed { ref table } if table == "PEOPLE"));
}

#[tokio::test]
async fn update_many_is_one_batch_write() {
    let store = people();
    store.insert_row("PEOPLE", &["1", "Ana", "Cali"]);
    store.insert_row("PEOPLE", &["2", "Luis", "Pasto"]);

    let outcome = repository(&store)
        .update_many(
            "id",
            vec![
                ("2".to_string(), Record::new().with("city", "Buga")),
                ("9".to_string(), Record::new().with("city", "Tuluá")),
                ("1".to_string(), Record::new().with("name", "Ana María")),
            ],
        )
        .await
        .unwrap();

    assert_eq!(outcome.updated, vec!["2".to_string(), "1".to_string()]);
    assert_eq!(outcome.missing, vec!["9".to_string()]);
    assert_eq!(outcome.updated_cells, 6);
    assert_eq!(store.calls(StoreOp::BatchUpdate), 1);
    assert_eq!(store.writes(), 1);
    assert_eq!(
        store.rows("PEOPLE"),
        vec![cells(&["1", "Ana María", "Cali"]), cells(&["2", "Luis", "Buga"])]
    );
}

#[tokio::test]
async fn delete_removes_the_row_and_caches_the_table_id() {
    let store = people();
    store.insert_row("PEOPLE", &["1", "Ana"]);
    store.insert_row("PEOPLE", &["2", "Luis"]);
    store.insert_row("PEOPLE", &["3", "Eva"]);
    let repo = repository(&store);

    assert!(repo.delete("id", "2").await.unwrap());
    assert!(repo.delete("id", "3").await.unwrap());
    assert!(!repo.delete("id", "2").await.unwrap());

    assert_eq!(store.rows("PEOPLE"), vec![cells(&["1", "Ana"])]);
    assert_eq!(store.calls(StoreOp::DescribeTable), 1);
    assert_eq!(store.calls(StoreOp::DeleteRow), 2);
}

#[tokio::test]
async fn verification_detects_a_shifted_row() {
    let store = people();
    store.insert_row("PEOPLE", &["1", "Ana"]);
    store.insert_row("PEOPLE", &["2", "Luis"]);
    let repo = repository_with(
        &store,
        fast_scheduler(),
        RepositoryConfig::default().with_verify_before_write(true),
    );

    store.mutate_after_next_read("PEOPLE", |rows| rows.insert(1, cells(&["0", "Zoe"])));
    let err = repo
        .update("id", "2", &Record::new().with("city", "Cali"))
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::ConcurrentModification { row: 3, .. }));
    assert!(err.is_retryable());
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn without_verification_a_shifted_row_is_overwritten() {
    let store = people();
    store.insert_row("PEOPLE", &["1", "Ana"]);
    store.insert_row("PEOPLE", &["2", "Luis"]);
    let repo = repository(&store);

    store.mutate_after_next_read("PEOPLE", |rows| rows.insert(1, cells(&["0", "Zoe"])));
    repo.update("id", "2", &Record::new().with("city", "Cali"))
        .await
        .unwrap();

    // The scan saw id 2 on row 3; after the insert row 3 held id 1
    assert_eq!(
        store.rows("PEOPLE"),
        vec![cells(&["0", "Zoe"]), cells(&["2", "Luis", "Cali"]), cells(&["2", "Luis"])]
    );
}

#[tokio::test(start_paused = true)]
async fn rate_limited_reads_resolve_after_backoff() {
    let store = people();
    store.insert_row("PEOPLE", &["1", "Ana"]);
    store.rate_limit_next(StoreOp::GetRange, 2);
    let scheduler = fast_scheduler();
    let repo = repository_with(&store, scheduler.clone(), RepositoryConfig::default());

    let all = repo.get_all().await.unwrap();

    assert_eq!(all.len(), 1);
    assert_eq!(store.calls(StoreOp::GetRange), 3);
    let snapshot = scheduler.snapshot();
    assert_eq!(snapshot.mode, SchedulerMode::Normal);
    assert_eq!(snapshot.current_base_delay.as_millis(), 1_000);
}

#[tokio::test]
async fn other_failures_keep_the_remote_message() {
    let store = people();
    store.insert_row("PEOPLE", &["1", "Ana"]);
    store.fail_next(
        StoreOp::UpdateRange,
        StoreError::remote(403, "The caller does not have permission"),
    );

    let err = repository(&store)
        .update("id", "1", &Record::new().with("city", "Cali"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("The caller does not have permission"));
    assert!(matches!(
        err,
        RepositoryError::StoreUnavailable { operation: "update_range", ref source, .. }
            if source.status() == Some(403)
    ));
    assert!(!err.is_retryable());
    assert_eq!(store.calls(StoreOp::UpdateRange), 1);
}
