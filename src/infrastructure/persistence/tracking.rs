//! # Change Tracking
//!
//! Per-field loaded/dirty flags for one aggregate instance.

use std::collections::BTreeSet;

/// Loaded and dirty flags for the fields of one aggregate instance.
///
/// A field is *loaded* once its value is held in memory and *dirty* once it
/// was written after load. Dirty implies loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeTracker {
    loaded: BTreeSet<&'static str>,
    dirty: BTreeSet<&'static str>,
}

impl ChangeTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a field as held in memory.
    pub fn mark_loaded(&mut self, field: &'static str) {
        self.loaded.insert(field);
    }

    /// Marks a field as written since the last save.
    pub fn mark_dirty(&mut self, field: &'static str) {
        self.loaded.insert(field);
        self.dirty.insert(field);
    }

    /// Returns true if the field's value is held in memory.
    #[must_use]
    pub fn is_loaded(&self, field: &str) -> bool {
        self.loaded.contains(field)
    }

    /// Returns true if the field was written since the last save.
    #[must_use]
    pub fn is_dirty(&self, field: &str) -> bool {
        self.dirty.contains(field)
    }

    /// Returns true if any field is dirty.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Dirty fields in name order.
    pub fn dirty_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.dirty.iter().copied()
    }

    /// Loaded fields in name order.
    pub fn loaded_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.loaded.iter().copied()
    }

    /// Clears every dirty flag. Loaded flags are kept.
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Forgets that a clean field is loaded.
    ///
    /// Returns false, and keeps the field, if it is dirty.
    pub fn forget(&mut self, field: &str) -> bool {
        if self.dirty.contains(field) {
            return false;
        }
        self.loaded.remove(field);
        true
    }
}
