//! # Lazy Record
//!
//! The loading and tracking engine behind aggregate state types.
//!
//! A [`LazyRecord`] holds the in-memory values of one stored record. Core
//! fields are fetched when the record is loaded. Deferred fields are fetched
//! on first access, one store call per [`FieldLayout`] group. Writes only
//! touch memory and mark the field dirty. [`LazyRecord::save`] turns the
//! dirty set into a single partial update.
//!
//! # Examples
//!
//! ```ignore
//! static NOTE: FieldLayout = FieldLayout::new("note", &["subject"], &[&["body"]]);
//!
//! let mut record = LazyRecord::load(store, &NOTE, key, LoadPolicy::Lazy, SavePolicy::DirtyOnly).await?;
//! let body: String = record.get("body").await?; // one fetch
//! record.set("body", &format!("{body}!"))?;     // no I/O
//! record.save().await?;                         // writes only `body`
//! ```

use crate::domain::value_objects::{AggregateKey, Version};
use crate::infrastructure::persistence::tracking::ChangeTracker;
use crate::infrastructure::persistence::traits::{
    BackingStore, FieldValues, RepositoryError, RepositoryResult, SaveOutcome,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, trace};

/// Static description of an aggregate's stored fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    /// Aggregate type name used to address records in the store.
    pub aggregate_type: &'static str,
    /// Fields fetched when the aggregate is loaded.
    pub core: &'static [&'static str],
    /// Deferred fields, grouped by what is fetched together.
    pub deferred: &'static [&'static [&'static str]],
}

impl FieldLayout {
    /// Creates a layout.
    #[must_use]
    pub const fn new(
        aggregate_type: &'static str,
        core: &'static [&'static str],
        deferred: &'static [&'static [&'static str]],
    ) -> Self {
        Self {
            aggregate_type,
            core,
            deferred,
        }
    }

    /// Returns the layout's own name for a field, if declared.
    #[must_use]
    pub fn resolve(&self, field: &str) -> Option<&'static str> {
        self.all_fields().find(|name| *name == field)
    }

    /// Returns the fields fetched together with `field`.
    ///
    /// Core fields form one group.
    #[must_use]
    pub fn group_of(&self, field: &str) -> Option<&'static [&'static str]> {
        if self.core.iter().any(|name| *name == field) {
            return Some(self.core);
        }
        self.deferred
            .iter()
            .copied()
            .find(|group| group.iter().any(|name| *name == field))
    }

    /// Returns true if the field is loaded on demand.
    #[must_use]
    pub fn is_deferred(&self, field: &str) -> bool {
        self.deferred
            .iter()
            .any(|group| group.iter().any(|name| *name == field))
    }

    /// Every declared field, core first.
    pub fn all_fields(&self) -> impl Iterator<Item = &'static str> {
        self.core
            .iter()
            .copied()
            .chain(self.deferred.iter().flat_map(|group| group.iter().copied()))
    }
}

/// Which fields [`LazyRecord::load`] fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Core fields only; deferred fields on first access.
    #[default]
    Lazy,
    /// Every field at load time.
    Eager,
}

/// Which fields [`LazyRecord::save`] writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SavePolicy {
    /// Fields written since the last save; nothing if none.
    #[default]
    DirtyOnly,
    /// Every loaded field, on every save.
    AllFields,
}

/// In-memory view of one stored record with lazy loading and dirty tracking.
///
/// # Invariants
///
/// - A deferred group is fetched at most once unless invalidated
/// - A fetch never overwrites a field written through this record
/// - The version is the one observed at load or set by this record's last
///   successful save
#[derive(Debug)]
pub struct LazyRecord {
    layout: &'static FieldLayout,
    key: AggregateKey,
    version: Version,
    values: FieldValues,
    tracker: ChangeTracker,
    save_policy: SavePolicy,
    store: Arc<dyn BackingStore>,
}

impl LazyRecord {
    /// Loads a record, fetching the fields selected by `load_policy`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the record does not exist.
    pub async fn load(
        store: Arc<dyn BackingStore>,
        layout: &'static FieldLayout,
        key: AggregateKey,
        load_policy: LoadPolicy,
        save_policy: SavePolicy,
    ) -> RepositoryResult<Self> {
        let fields: Vec<&'static str> = match load_policy {
            LoadPolicy::Lazy => layout.core.to_vec(),
            LoadPolicy::Eager => layout.all_fields().collect(),
        };

        let fetched = store
            .fetch(layout.aggregate_type, &key, &fields)
            .await?
            .ok_or_else(|| RepositoryError::not_found(layout.aggregate_type, key.as_str()))?;

        let mut tracker = ChangeTracker::new();
        for field in fields.iter().copied() {
            tracker.mark_loaded(field);
        }

        Ok(Self {
            layout,
            key,
            version: fetched.version,
            values: fetched.values,
            tracker,
            save_policy,
            store,
        })
    }

    /// Wraps values that were just inserted; every field counts as loaded.
    #[must_use]
    pub fn from_inserted(
        store: Arc<dyn BackingStore>,
        layout: &'static FieldLayout,
        key: AggregateKey,
        version: Version,
        values: FieldValues,
        save_policy: SavePolicy,
    ) -> Self {
        let mut tracker = ChangeTracker::new();
        for field in layout.all_fields() {
            tracker.mark_loaded(field);
        }
        Self {
            layout,
            key,
            version,
            values,
            tracker,
            save_policy,
            store,
        }
    }

    /// Returns the record key.
    #[must_use]
    pub fn key(&self) -> &AggregateKey {
        &self.key
    }

    /// Returns the version this record will write against.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the loaded/dirty flags.
    #[must_use]
    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Returns the field layout.
    #[must_use]
    pub fn layout(&self) -> &'static FieldLayout {
        self.layout
    }

    /// Reads a field, fetching its group on first access.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::UnknownField` for undeclared fields,
    /// `RepositoryError::NotFound` if the record vanished before a deferred
    /// fetch, and `RepositoryError::Serialization` if the stored value is
    /// missing or has the wrong shape.
    pub async fn get<T: DeserializeOwned>(&mut self, field: &str) -> RepositoryResult<T> {
        let field = self.resolve(field)?;
        if !self.tracker.is_loaded(field) {
            self.fetch_group(field).await?;
        }

        let value = self.values.get(field).cloned().ok_or_else(|| {
            RepositoryError::serialization(format!(
                "{} {} has no stored value for field {field}",
                self.layout.aggregate_type, self.key
            ))
        })?;
        Ok(serde_json::from_value(value)?)
    }

    /// Writes a field in memory and marks it dirty.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::UnknownField` for undeclared fields and
    /// `RepositoryError::Serialization` if the value cannot be encoded.
    pub fn set<T: Serialize + ?Sized>(&mut self, field: &str, value: &T) -> RepositoryResult<()> {
        let field = self.resolve(field)?;
        let value = serde_json::to_value(value)?;
        self.values.insert(field.to_string(), value);
        self.tracker.mark_dirty(field);
        trace!(
            aggregate_type = self.layout.aggregate_type,
            key = %self.key,
            field,
            "field marked dirty"
        );
        Ok(())
    }

    /// Drops the cached value of a clean field so the next read fetches it.
    ///
    /// Returns false, leaving the value in place, if the field is dirty.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::UnknownField` for undeclared fields.
    pub fn invalidate(&mut self, field: &str) -> RepositoryResult<bool> {
        let field = self.resolve(field)?;
        if !self.tracker.forget(field) {
            return Ok(false);
        }
        self.values.remove(field);
        Ok(true)
    }

    /// Returns the values [`LazyRecord::save`] would write.
    #[must_use]
    pub fn pending_changes(&self) -> FieldValues {
        let selected: Vec<&'static str> = match self.save_policy {
            SavePolicy::DirtyOnly => self.tracker.dirty_fields().collect(),
            SavePolicy::AllFields => self.tracker.loaded_fields().collect(),
        };
        selected
            .into_iter()
            .filter_map(|field| {
                self.values
                    .get(field)
                    .map(|value| (field.to_string(), value.clone()))
            })
            .collect()
    }

    /// Writes pending changes as one partial update.
    ///
    /// No store I/O happens when nothing is pending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::VersionConflict` if the stored record moved
    /// past this record's version. Store errors propagate unchanged and leave
    /// the dirty flags in place.
    pub async fn save(&mut self) -> RepositoryResult<SaveOutcome> {
        let changes = self.pending_changes();
        if changes.is_empty() {
            debug!(
                aggregate_type = self.layout.aggregate_type,
                key = %self.key,
                "no pending changes"
            );
            return Ok(SaveOutcome::Unchanged);
        }

        let fields: Vec<String> = changes.keys().cloned().collect();
        let version = self
            .store
            .write(
                self.layout.aggregate_type,
                &self.key,
                Some(self.version),
                changes,
            )
            .await?;

        self.version = version;
        self.tracker.clear_dirty();
        Ok(SaveOutcome::Written { fields, version })
    }

    fn resolve(&self, field: &str) -> RepositoryResult<&'static str> {
        self.layout
            .resolve(field)
            .ok_or_else(|| RepositoryError::unknown_field(self.layout.aggregate_type, field))
    }

    async fn fetch_group(&mut self, field: &'static str) -> RepositoryResult<()> {
        let group = self.layout.group_of(field).unwrap_or(&[]);
        let wanted: Vec<&'static str> = group
            .iter()
            .copied()
            .filter(|name| !self.tracker.is_loaded(name))
            .collect();

        debug!(
            aggregate_type = self.layout.aggregate_type,
            key = %self.key,
            field,
            group = ?wanted,
            "loading deferred fields"
        );

        let mut fetched = self
            .store
            .fetch(self.layout.aggregate_type, &self.key, &wanted)
            .await?
            .ok_or_else(|| {
                RepositoryError::not_found(self.layout.aggregate_type, self.key.as_str())
            })?;

        if fetched.version != self.version {
            debug!(
                aggregate_type = self.layout.aggregate_type,
                key = %self.key,
                loaded = %self.version,
                current = %fetched.version,
                "record changed since load"
            );
        }

        for name in wanted {
            if let Some(value) = fetched.values.remove(name) {
                self.values.insert(name.to_string(), value);
            }
            self.tracker.mark_loaded(name);
        }
        Ok(())
    }
}
