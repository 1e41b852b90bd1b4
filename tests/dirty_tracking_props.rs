#![allow(clippy::unwrap_used)]

use aggregate_repository::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Edit {
    Retitle(String),
    Revise(String),
    Read,
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        "[A-Za-z][A-Za-z ]{0,15}".prop_map(Edit::Retitle),
        "[a-z ]{0,30}".prop_map(Edit::Revise),
        Just(Edit::Read),
    ]
}

async fn apply(strategy: PersistenceStrategy, edits: &[Edit]) -> (SaveOutcome, BTreeSet<String>) {
    let store = Arc::new(InMemoryStore::new());
    let repo = BookRepository::new(store, strategy);
    let key = AggregateKey::parse("B1").unwrap();
    repo.create(key.clone(), NewBook::new("Go", "Pike", "chapter text").unwrap())
        .await
        .unwrap();

    let mut book = repo.load(&key).await.unwrap();
    let mut touched = BTreeSet::new();
    for edit in edits {
        match edit {
            Edit::Retitle(title) => {
                book.retitle(title.clone()).await.unwrap();
                touched.insert("title".to_string());
            }
            Edit::Revise(content) => {
                book.revise(content.clone()).await.unwrap();
                touched.insert("content".to_string());
            }
            Edit::Read => {
                book.read().await.unwrap();
            }
        }
    }
    (repo.save(&mut book).await.unwrap(), touched)
}

proptest! {
    #[test]
    fn lazy_tracking_writes_exactly_touched_fields(edits in prop::collection::vec(edit(), 0..8)) {
        let (outcome, touched) =
            tokio_test::block_on(apply(PersistenceStrategy::LazyTracking, &edits));

        let written: BTreeSet<String> = outcome.fields().iter().cloned().collect();
        prop_assert_eq!(written, touched.clone());
        prop_assert_eq!(outcome.is_written(), !touched.is_empty());
    }

    #[test]
    fn snapshot_diff_never_writes_untouched_fields(edits in prop::collection::vec(edit(), 0..8)) {
        let (outcome, touched) =
            tokio_test::block_on(apply(PersistenceStrategy::SnapshotDiff, &edits));

        let written: BTreeSet<String> = outcome.fields().iter().cloned().collect();
        prop_assert!(written.is_subset(&touched));
    }
}
