#![allow(clippy::unwrap_used)]

use aggregate_repository::infrastructure::persistence::in_memory::StoreLog;
use aggregate_repository::prelude::*;
use std::sync::Arc;

const READ_AT_MILLIS: i64 = 1_704_067_200_123;

fn b1() -> AggregateKey {
    AggregateKey::parse("B1").unwrap()
}

fn read_at() -> Timestamp {
    Timestamp::from_millis(READ_AT_MILLIS).unwrap()
}

async fn seeded(strategy: PersistenceStrategy) -> (Arc<InMemoryStore>, BookRepository) {
    let store = Arc::new(InMemoryStore::new());
    let repo = BookRepository::new(store.clone(), strategy);
    repo.create(b1(), NewBook::new("Go", "Pike", "chapter text").unwrap())
        .await
        .unwrap();
    store.reset_log();
    (store, repo)
}

fn fetched_fields(log: &StoreLog) -> Vec<Vec<String>> {
    log.fetches.iter().map(|f| f.fields.clone()).collect()
}

mod lazy_tracking {
    use super::*;

    #[tokio::test]
    async fn record_reading_writes_content_only() {
        let (store, repo) = seeded(PersistenceStrategy::LazyTracking).await;

        let mut book = repo.load(&b1()).await.unwrap();
        assert_eq!(fetched_fields(&store.log()), vec![vec!["title", "author"]]);

        book.record_reading(read_at()).await.unwrap();
        assert_eq!(
            fetched_fields(&store.log()),
            vec![vec!["title", "author"], vec!["content"]]
        );

        let outcome = repo.save(&mut book).await.unwrap();
        assert_eq!(outcome.fields().to_vec(), vec!["content".to_string()]);

        let write = store.last_write().unwrap();
        assert_eq!(write.fields, vec!["content".to_string()]);
        assert_eq!(write.version, Version::new(2));

        let mut reloaded = repo.load(&b1()).await.unwrap();
        assert_eq!(
            reloaded.read().await.unwrap(),
            "chapter text: read at 2024-01-01T00:00:00.123Z"
        );
        assert_eq!(reloaded.title().await.unwrap(), "Go");
    }

    #[tokio::test]
    async fn deferred_field_fetched_once() {
        let (store, repo) = seeded(PersistenceStrategy::LazyTracking).await;
        let mut book = repo.load(&b1()).await.unwrap();

        book.read().await.unwrap();
        book.read().await.unwrap();
        book.word_count().await.unwrap();

        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn core_reads_need_no_extra_fetch() {
        let (store, repo) = seeded(PersistenceStrategy::LazyTracking).await;
        let mut book = repo.load(&b1()).await.unwrap();

        assert_eq!(book.byline().await.unwrap(), "Go by Pike");
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn clean_save_is_a_no_op() {
        let (store, repo) = seeded(PersistenceStrategy::LazyTracking).await;
        let mut book = repo.load(&b1()).await.unwrap();
        book.read().await.unwrap();

        let outcome = repo.save(&mut book).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Unchanged);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn second_save_writes_nothing() {
        let (store, repo) = seeded(PersistenceStrategy::LazyTracking).await;
        let mut book = repo.load(&b1()).await.unwrap();
        book.revise("rewritten").await.unwrap();

        assert!(repo.save(&mut book).await.unwrap().is_written());
        assert_eq!(repo.save(&mut book).await.unwrap(), SaveOutcome::Unchanged);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn blind_write_skips_fetch() {
        let (store, repo) = seeded(PersistenceStrategy::LazyTracking).await;
        let mut book = repo.load(&b1()).await.unwrap();

        book.revise("rewritten").await.unwrap();
        assert_eq!(store.fetch_count(), 1);
        assert_eq!(book.read().await.unwrap(), "rewritten");
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn retitle_and_revise_write_both() {
        let (store, repo) = seeded(PersistenceStrategy::LazyTracking).await;
        let mut book = repo.load(&b1()).await.unwrap();

        book.retitle("Go, Second Edition").await.unwrap();
        book.revise("new text").await.unwrap();
        repo.save(&mut book).await.unwrap();

        assert_eq!(
            store.last_write().unwrap().fields,
            vec!["content".to_string(), "title".to_string()]
        );
    }
}

mod strategies {
    use super::*;

    #[tokio::test]
    async fn every_strategy_round_trips() {
        for strategy in PersistenceStrategy::ALL {
            let (_, repo) = seeded(strategy).await;

            let mut book = repo.load(&b1()).await.unwrap();
            book.record_reading(read_at()).await.unwrap();
            repo.save(&mut book).await.unwrap();

            let mut reloaded = repo.load(&b1()).await.unwrap();
            assert_eq!(
                reloaded.read().await.unwrap(),
                "chapter text: read at 2024-01-01T00:00:00.123Z",
                "{strategy}"
            );
            assert_eq!(reloaded.byline().await.unwrap(), "Go by Pike", "{strategy}");
        }
    }

    #[tokio::test]
    async fn unmodified_book_saves_without_io() {
        for strategy in PersistenceStrategy::ALL {
            if !strategy.skips_clean_saves() {
                continue;
            }
            let (store, repo) = seeded(strategy).await;
            let mut book = repo.load(&b1()).await.unwrap();
            book.byline().await.unwrap();

            assert_eq!(
                repo.save(&mut book).await.unwrap(),
                SaveOutcome::Unchanged,
                "{strategy}"
            );
            assert_eq!(store.write_count(), 0, "{strategy}");
        }
    }

    #[tokio::test]
    async fn full_load_save_writes_every_field() {
        let (store, repo) = seeded(PersistenceStrategy::FullLoadSave).await;

        let mut book = repo.load(&b1()).await.unwrap();
        assert_eq!(
            fetched_fields(&store.log()),
            vec![vec!["title", "author", "content"]]
        );

        let outcome = repo.save(&mut book).await.unwrap();
        assert_eq!(
            outcome.fields().to_vec(),
            vec!["author".to_string(), "content".to_string(), "title".to_string()]
        );
    }

    #[tokio::test]
    async fn mapped_writes_whole_record_only_when_modified() {
        let (store, repo) = seeded(PersistenceStrategy::Mapped).await;
        let mut book = repo.load(&b1()).await.unwrap();

        assert_eq!(repo.save(&mut book).await.unwrap(), SaveOutcome::Unchanged);

        book.revise("rewritten").await.unwrap();
        let outcome = repo.save(&mut book).await.unwrap();
        assert_eq!(outcome.fields().len(), 3);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn snapshot_diff_ignores_reverted_changes() {
        let (store, repo) = seeded(PersistenceStrategy::SnapshotDiff).await;
        let mut book = repo.load(&b1()).await.unwrap();

        book.retitle("Rust").await.unwrap();
        book.retitle("Go").await.unwrap();
        assert_eq!(repo.save(&mut book).await.unwrap(), SaveOutcome::Unchanged);

        book.revise("rewritten").await.unwrap();
        let outcome = repo.save(&mut book).await.unwrap();
        assert_eq!(outcome.fields().to_vec(), vec!["content".to_string()]);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn second_read_needs_no_fetch() {
        for strategy in PersistenceStrategy::ALL {
            let (store, repo) = seeded(strategy).await;
            let mut book = repo.load(&b1()).await.unwrap();
            store.reset_log();

            assert_eq!(book.read().await.unwrap(), "chapter text", "{strategy}");
            let after_first = store.fetch_count();
            assert!(after_first <= 1, "{strategy}: {after_first} fetches");

            book.read().await.unwrap();
            assert_eq!(store.fetch_count(), after_first, "{strategy}");
        }
    }

    #[tokio::test]
    async fn direct_access_reads_back_own_write_without_fetch() {
        let (store, repo) = seeded(PersistenceStrategy::DirectAccess).await;
        let mut book = repo.load(&b1()).await.unwrap();
        store.reset_log();

        book.revise("rewritten").await.unwrap();
        assert_eq!(book.read().await.unwrap(), "rewritten");
        assert_eq!(store.fetch_count(), 0);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn direct_access_writes_immediately() {
        let (store, repo) = seeded(PersistenceStrategy::DirectAccess).await;
        let mut book = repo.load(&b1()).await.unwrap();
        assert_eq!(fetched_fields(&store.log()), vec![Vec::<String>::new()]);

        book.revise("rewritten").await.unwrap();
        assert_eq!(store.write_count(), 1);

        assert_eq!(repo.save(&mut book).await.unwrap(), SaveOutcome::Unchanged);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn created_book_saves_without_reloading() {
        for strategy in PersistenceStrategy::ALL {
            let store = Arc::new(InMemoryStore::new());
            let repo = BookRepository::new(store.clone(), strategy);
            let mut book = repo
                .create(b1(), NewBook::new("Go", "Pike", "text").unwrap())
                .await
                .unwrap();

            assert_eq!(book.read().await.unwrap(), "text", "{strategy}");
            book.revise("more text").await.unwrap();
            repo.save(&mut book).await.unwrap();

            let mut reloaded = repo.load(&b1()).await.unwrap();
            assert_eq!(reloaded.read().await.unwrap(), "more text", "{strategy}");
        }
    }
}

mod errors {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_not_found() {
        for strategy in PersistenceStrategy::ALL {
            let (_, repo) = seeded(strategy).await;
            let missing = AggregateKey::parse("B404").unwrap();
            let err = repo.load(&missing).await.unwrap_err();
            assert!(err.is_not_found(), "{strategy}: {err}");
        }
    }

    #[tokio::test]
    async fn create_rejects_existing_key() {
        let (_, repo) = seeded(PersistenceStrategy::LazyTracking).await;
        let err = repo
            .create(b1(), NewBook::new("Go", "Pike", "text").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn concurrent_save_conflicts() {
        for strategy in [
            PersistenceStrategy::FullLoadSave,
            PersistenceStrategy::Mapped,
            PersistenceStrategy::LazyTracking,
            PersistenceStrategy::SnapshotDiff,
        ] {
            let (_, repo) = seeded(strategy).await;
            let mut first = repo.load(&b1()).await.unwrap();
            let mut second = repo.load(&b1()).await.unwrap();

            first.revise("first").await.unwrap();
            repo.save(&mut first).await.unwrap();

            second.revise("second").await.unwrap();
            let err = repo.save(&mut second).await.unwrap_err();
            assert!(err.is_version_conflict(), "{strategy}: {err}");
        }
    }

    #[tokio::test]
    async fn direct_access_last_write_wins() {
        let (_, repo) = seeded(PersistenceStrategy::DirectAccess).await;
        let mut first = repo.load(&b1()).await.unwrap();
        let mut second = repo.load(&b1()).await.unwrap();

        first.revise("first").await.unwrap();
        second.revise("second").await.unwrap();

        // each instance sees its own latest write
        assert_eq!(first.read().await.unwrap(), "first");
        assert_eq!(second.read().await.unwrap(), "second");

        let mut reloaded = repo.load(&b1()).await.unwrap();
        assert_eq!(reloaded.read().await.unwrap(), "second");
    }

    #[tokio::test]
    async fn store_failure_reaches_caller() {
        let (store, repo) = seeded(PersistenceStrategy::LazyTracking).await;
        let mut book = repo.load(&b1()).await.unwrap();
        book.revise("rewritten").await.unwrap();

        store.fail_next(RepositoryError::connection("connection reset"));
        let err = repo.save(&mut book).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Connection(_)));

        // changes stay pending after a failed save
        let outcome = repo.save(&mut book).await.unwrap();
        assert_eq!(outcome.fields().to_vec(), vec!["content".to_string()]);
    }

    #[tokio::test]
    async fn deferred_fetch_failure_reaches_caller() {
        let (store, repo) = seeded(PersistenceStrategy::LazyTracking).await;
        let mut book = repo.load(&b1()).await.unwrap();

        store.fail_next(RepositoryError::query("timeout"));
        assert!(matches!(
            book.read().await.unwrap_err(),
            RepositoryError::Query(_)
        ));
        assert_eq!(book.read().await.unwrap(), "chapter text");
    }

    #[tokio::test]
    async fn invalid_title_is_a_domain_error() {
        let (store, repo) = seeded(PersistenceStrategy::LazyTracking).await;
        let mut book = repo.load(&b1()).await.unwrap();

        let err = book.retitle("   ").await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Domain(DomainError::ValidationError(_))
        ));
        assert_eq!(repo.save(&mut book).await.unwrap(), SaveOutcome::Unchanged);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn deleted_book_cannot_be_saved() {
        let (_, repo) = seeded(PersistenceStrategy::Mapped).await;
        let mut book = repo.load(&b1()).await.unwrap();

        assert!(repo.delete(&b1()).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);

        book.revise("orphan").await.unwrap();
        assert!(repo.save(&mut book).await.unwrap_err().is_not_found());
    }
}
