//! # In-Memory Store
//!
//! In-memory implementation of [`BackingStore`] for testing.
//!
//! Besides holding records in a thread-safe `HashMap`, the store keeps a log
//! of every fetch and write so tests can assert exactly what I/O a repository
//! performed. A failure can be queued to check that store errors reach the
//! caller unchanged.

use crate::domain::value_objects::{AggregateKey, Version};
use crate::infrastructure::persistence::traits::{
    BackingStore, FetchedFields, FieldValues, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

/// A fetch observed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchEntry {
    /// Aggregate type addressed.
    pub aggregate_type: &'static str,
    /// Record key.
    pub key: AggregateKey,
    /// Requested fields, in request order.
    pub fields: Vec<String>,
}

/// A successful partial update observed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEntry {
    /// Aggregate type addressed.
    pub aggregate_type: &'static str,
    /// Record key.
    pub key: AggregateKey,
    /// Written fields, in name order.
    pub fields: Vec<String>,
    /// Version after the write.
    pub version: Version,
}

/// Operation log of an [`InMemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreLog {
    /// Every fetch, including existence probes.
    pub fetches: Vec<FetchEntry>,
    /// Every successful write.
    pub writes: Vec<WriteEntry>,
    /// Number of successful inserts.
    pub inserts: u64,
    /// Number of successful deletes.
    pub deletes: u64,
}

#[derive(Debug, Clone)]
struct StoredRecord {
    version: Version,
    fields: FieldValues,
}

type RecordId = (&'static str, AggregateKey);

/// In-memory implementation of [`BackingStore`].
///
/// Clones share the same records and log.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    storage: Arc<RwLock<HashMap<RecordId, StoredRecord>>>,
    log: Arc<Mutex<StoreLog>>,
    pending_failure: Arc<Mutex<Option<RepositoryError>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records in the store.
    ///
    /// Waits for any in-flight write to finish.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Returns true if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Clears all records. The log is kept.
    pub async fn clear(&self) {
        let mut storage = self.storage.write().await;
        storage.clear();
    }

    /// Returns a copy of the operation log.
    #[must_use]
    pub fn log(&self) -> StoreLog {
        self.log.lock().clone()
    }

    /// Empties the operation log.
    pub fn reset_log(&self) {
        *self.log.lock() = StoreLog::default();
    }

    /// Number of fetches since the last reset.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.log.lock().fetches.len()
    }

    /// Number of writes since the last reset.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.log.lock().writes.len()
    }

    /// The most recent write, if any.
    #[must_use]
    pub fn last_write(&self) -> Option<WriteEntry> {
        self.log.lock().writes.last().cloned()
    }

    /// Makes the next store operation fail with `error`.
    pub fn fail_next(&self, error: RepositoryError) {
        *self.pending_failure.lock() = Some(error);
    }

    fn take_failure(&self) -> RepositoryResult<()> {
        match self.pending_failure.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BackingStore for InMemoryStore {
    async fn fetch(
        &self,
        aggregate_type: &'static str,
        key: &AggregateKey,
        fields: &[&str],
    ) -> RepositoryResult<Option<FetchedFields>> {
        self.take_failure()?;
        self.log.lock().fetches.push(FetchEntry {
            aggregate_type,
            key: key.clone(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        });

        let storage = self.storage.read().await;
        Ok(storage
            .get(&(aggregate_type, key.clone()))
            .map(|record| FetchedFields {
                version: record.version,
                values: fields
                    .iter()
                    .filter_map(|f| {
                        record
                            .fields
                            .get(*f)
                            .map(|value| (f.to_string(), value.clone()))
                    })
                    .collect(),
            }))
    }

    async fn insert(
        &self,
        aggregate_type: &'static str,
        key: &AggregateKey,
        values: FieldValues,
    ) -> RepositoryResult<Version> {
        self.take_failure()?;
        let mut storage = self.storage.write().await;
        let id = (aggregate_type, key.clone());
        if storage.contains_key(&id) {
            return Err(RepositoryError::duplicate(aggregate_type, key.as_str()));
        }
        storage.insert(
            id,
            StoredRecord {
                version: Version::INITIAL,
                fields: values,
            },
        );
        self.log.lock().inserts += 1;
        Ok(Version::INITIAL)
    }

    async fn write(
        &self,
        aggregate_type: &'static str,
        key: &AggregateKey,
        expected: Option<Version>,
        changes: FieldValues,
    ) -> RepositoryResult<Version> {
        self.take_failure()?;
        let mut storage = self.storage.write().await;
        let record = storage
            .get_mut(&(aggregate_type, key.clone()))
            .ok_or_else(|| RepositoryError::not_found(aggregate_type, key.as_str()))?;

        if let Some(expected) = expected
            && expected != record.version
        {
            return Err(RepositoryError::version_conflict(
                aggregate_type,
                key.as_str(),
                expected,
                record.version,
            ));
        }

        let fields: Vec<String> = changes.keys().cloned().collect();
        record.fields.extend(changes);
        record.version = record.version.next();
        trace!(aggregate_type, key = %key, version = %record.version, "record updated");

        self.log.lock().writes.push(WriteEntry {
            aggregate_type,
            key: key.clone(),
            fields,
            version: record.version,
        });
        Ok(record.version)
    }

    async fn delete(
        &self,
        aggregate_type: &'static str,
        key: &AggregateKey,
    ) -> RepositoryResult<bool> {
        self.take_failure()?;
        let mut storage = self.storage.write().await;
        let removed = storage.remove(&(aggregate_type, key.clone())).is_some();
        if removed {
            self.log.lock().deletes += 1;
        }
        Ok(removed)
    }

    async fn count(&self, aggregate_type: &'static str) -> RepositoryResult<u64> {
        self.take_failure()?;
        let storage = self.storage.read().await;
        Ok(storage
            .keys()
            .filter(|(kind, _)| *kind == aggregate_type)
            .count() as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(value: &str) -> AggregateKey {
        AggregateKey::parse(value).unwrap()
    }

    fn fields(pairs: &[(&str, serde_json::Value)]) -> FieldValues {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn new_store_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty().await);
        assert_eq!(store.count("book").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn insert_and_fetch() {
        let store = InMemoryStore::new();
        let version = store
            .insert("book", &key("B1"), fields(&[("title", json!("Go"))]))
            .await
            .unwrap();
        assert_eq!(version, Version::INITIAL);

        let fetched = store
            .fetch("book", &key("B1"), &["title", "content"])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.version, Version::INITIAL);
        assert_eq!(fetched.values, fields(&[("title", json!("Go"))]));
    }

    #[tokio::test]
    async fn fetch_missing_returns_none() {
        let store = InMemoryStore::new();
        let fetched = store.fetch("book", &key("nope"), &[]).await.unwrap();
        assert!(fetched.is_none());
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn insert_duplicate_fails() {
        let store = InMemoryStore::new();
        store.insert("book", &key("B1"), FieldValues::new()).await.unwrap();

        let err = store
            .insert("book", &key("B1"), FieldValues::new())
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn aggregate_types_are_separate() {
        let store = InMemoryStore::new();
        store.insert("book", &key("X"), FieldValues::new()).await.unwrap();
        store.insert("note", &key("X"), FieldValues::new()).await.unwrap();

        assert_eq!(store.count("book").await.unwrap(), 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn write_merges_and_bumps_version() {
        let store = InMemoryStore::new();
        store
            .insert(
                "book",
                &key("B1"),
                fields(&[("title", json!("Go")), ("content", json!("a"))]),
            )
            .await
            .unwrap();

        let version = store
            .write(
                "book",
                &key("B1"),
                Some(Version::INITIAL),
                fields(&[("content", json!("b"))]),
            )
            .await
            .unwrap();
        assert_eq!(version, Version::new(2));

        let fetched = store
            .fetch("book", &key("B1"), &["title", "content"])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            fetched.values,
            fields(&[("title", json!("Go")), ("content", json!("b"))])
        );
        assert_eq!(store.last_write().unwrap().fields, vec!["content"]);
    }

    #[tokio::test]
    async fn write_with_stale_version_conflicts() {
        let store = InMemoryStore::new();
        store.insert("book", &key("B1"), FieldValues::new()).await.unwrap();
        store
            .write("book", &key("B1"), None, FieldValues::new())
            .await
            .unwrap();

        let err = store
            .write(
                "book",
                &key("B1"),
                Some(Version::INITIAL),
                FieldValues::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_version_conflict());
    }

    #[tokio::test]
    async fn write_missing_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .write("book", &key("B1"), None, FieldValues::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete() {
        let store = InMemoryStore::new();
        store.insert("book", &key("B1"), FieldValues::new()).await.unwrap();

        assert!(store.delete("book", &key("B1")).await.unwrap());
        assert!(!store.delete("book", &key("B1")).await.unwrap());
        assert_eq!(store.log().deletes, 1);
    }

    #[tokio::test]
    async fn queued_failure_fires_once() {
        let store = InMemoryStore::new();
        store.fail_next(RepositoryError::connection("socket closed"));

        let err = store.count("book").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Connection(_)));
        assert_eq!(store.count("book").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = InMemoryStore::new();
        let clone = store.clone();
        clone.insert("book", &key("B1"), FieldValues::new()).await.unwrap();
        assert_eq!(store.len().await, 1);

        store.clear().await;
        assert!(clone.is_empty().await);
    }

    #[tokio::test]
    async fn len_waits_for_writer() {
        let store = InMemoryStore::new();
        store.insert("book", &key("B1"), FieldValues::new()).await.unwrap();

        let guard = store.storage.write().await;
        let counter = store.clone();
        let pending = tokio::spawn(async move { counter.len().await });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        drop(guard);
        assert_eq!(pending.await.unwrap(), 1);
    }
}
