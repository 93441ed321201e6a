//! Order and content of created rows, for arbitrary string records

use proptest::prelude::*;
use std::sync::Arc;
use tabula_codec::Record;
use tabula_repository::{RepositoryConfig, TabularRepository, TabularStore};
use tabula_test_utils::{fast_scheduler, InMemoryStore};

const FIELDS: [&str; 3] = ["id", "name", "city"];

fn record() -> impl Strategy<Value = Record> {
    ("[a-z0-9]{1,8}", "[A-Za-zÁÉÍÓÚáéíóúñ]{0,12}", "[A-Za-z]{0,10}").prop_map(
        |(id, name, city)| {
            Record::new()
                .with("id", id)
                .with("name", name)
                .with("city", city)
        },
    )
}

fn read_back(records: &[Record]) -> Vec<Record> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        let store = Arc::new(InMemoryStore::new().with_table("PEOPLE", &FIELDS));
        let repo = TabularRepository::new(
            "PEOPLE",
            FIELDS,
            store as Arc<dyn TabularStore>,
            fast_scheduler(),
            RepositoryConfig::default(),
        )
        .unwrap();
        for record in records {
            repo.create(record.clone()).await.unwrap();
        }
        repo.get_all().await.unwrap()
    })
}

proptest! {
    #[test]
    fn prop_created_records_read_back_in_order(records in prop::collection::vec(record(), 0..20)) {
        prop_assert_eq!(read_back(&records), records);
    }
}
