//! # Persistence Strategies
//!
//! The ways a repository can move an aggregate between memory and store.
//!
//! | Strategy | Load cost | Save cost |
//! |---|---|---|
//! | [`FullLoadSave`](PersistenceStrategy::FullLoadSave) | all fields | all fields, always |
//! | [`Mapped`](PersistenceStrategy::Mapped) | whole mapped record | whole record when modified |
//! | [`LazyTracking`](PersistenceStrategy::LazyTracking) | core fields | dirty fields |
//! | [`SnapshotDiff`](PersistenceStrategy::SnapshotDiff) | whole mapped record | fields changed since load |
//! | [`DirectAccess`](PersistenceStrategy::DirectAccess) | existence probe | one write per mutation |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing an unknown strategy name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown persistence strategy: {0}")]
pub struct ParseStrategyError(pub String);

/// What loading an aggregate costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadCost {
    /// Every field, every time.
    AllFields,
    /// The whole record, through the mapper.
    MappedRecord,
    /// Core fields; deferred fields on first access.
    CoreFields,
    /// Nothing beyond an existence check.
    ExistenceProbe,
}

/// What saving an aggregate costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveCost {
    /// Every field, every time.
    AllFields,
    /// The whole record, only if anything changed.
    WholeRecordWhenModified,
    /// Only fields written since load.
    DirtyFields,
    /// Only fields whose value differs from the load snapshot.
    ChangedFields,
    /// Nothing at save; each mutation is written immediately.
    ImmediatePerWrite,
}

/// Persistence strategy of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceStrategy {
    /// Load and save every field.
    FullLoadSave,
    /// The aggregate state is a serde-mapped record.
    Mapped,
    /// Lazy deferred fields with per-field dirty tracking.
    #[default]
    LazyTracking,
    /// The facade wraps a mapped record diffed against a load snapshot.
    SnapshotDiff,
    /// Every write goes straight to the store; reads are fetched once.
    DirectAccess,
}

impl PersistenceStrategy {
    /// Every strategy, in table order.
    pub const ALL: [Self; 5] = [
        Self::FullLoadSave,
        Self::Mapped,
        Self::LazyTracking,
        Self::SnapshotDiff,
        Self::DirectAccess,
    ];

    /// Returns the configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullLoadSave => "full_load_save",
            Self::Mapped => "mapped",
            Self::LazyTracking => "lazy_tracking",
            Self::SnapshotDiff => "snapshot_diff",
            Self::DirectAccess => "direct_access",
        }
    }

    /// Returns what a load fetches.
    #[must_use]
    pub const fn load_cost(self) -> LoadCost {
        match self {
            Self::FullLoadSave => LoadCost::AllFields,
            Self::Mapped | Self::SnapshotDiff => LoadCost::MappedRecord,
            Self::LazyTracking => LoadCost::CoreFields,
            Self::DirectAccess => LoadCost::ExistenceProbe,
        }
    }

    /// Returns what a save writes.
    #[must_use]
    pub const fn save_cost(self) -> SaveCost {
        match self {
            Self::FullLoadSave => SaveCost::AllFields,
            Self::Mapped => SaveCost::WholeRecordWhenModified,
            Self::LazyTracking => SaveCost::DirtyFields,
            Self::SnapshotDiff => SaveCost::ChangedFields,
            Self::DirectAccess => SaveCost::ImmediatePerWrite,
        }
    }

    /// Returns the main constraint of the strategy.
    #[must_use]
    pub const fn constraint(self) -> &'static str {
        match self {
            Self::FullLoadSave => "simplest; poor for large aggregates",
            Self::Mapped => "aggregate shape must match the mapping",
            Self::LazyTracking => "needs a tracking state type per aggregate",
            Self::SnapshotDiff => "facade wraps a separately mapped record",
            Self::DirectAccess => "no batching; poor under many writes per transaction",
        }
    }

    /// Returns true if unmodified aggregates save without store I/O.
    #[must_use]
    pub const fn skips_clean_saves(self) -> bool {
        !matches!(self, Self::FullLoadSave)
    }
}

impl fmt::Display for PersistenceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersistenceStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| ParseStrategyError(s.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_is_lazy_tracking() {
        assert_eq!(
            PersistenceStrategy::default(),
            PersistenceStrategy::LazyTracking
        );
    }

    #[test]
    fn names_round_trip() {
        for strategy in PersistenceStrategy::ALL {
            assert_eq!(
                strategy.as_str().parse::<PersistenceStrategy>().unwrap(),
                strategy
            );
        }
    }

    #[test]
    fn parse_accepts_dashes_and_case() {
        assert_eq!(
            "Direct-Access".parse::<PersistenceStrategy>().unwrap(),
            PersistenceStrategy::DirectAccess
        );
        assert!("orm".parse::<PersistenceStrategy>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&PersistenceStrategy::SnapshotDiff).unwrap();
        assert_eq!(json, "\"snapshot_diff\"");
    }

    #[test]
    fn cost_table() {
        use PersistenceStrategy::*;

        assert_eq!(FullLoadSave.load_cost(), LoadCost::AllFields);
        assert_eq!(FullLoadSave.save_cost(), SaveCost::AllFields);
        assert_eq!(LazyTracking.load_cost(), LoadCost::CoreFields);
        assert_eq!(LazyTracking.save_cost(), SaveCost::DirtyFields);
        assert_eq!(DirectAccess.load_cost(), LoadCost::ExistenceProbe);
        assert_eq!(DirectAccess.save_cost(), SaveCost::ImmediatePerWrite);
        assert!(!FullLoadSave.skips_clean_saves());
        assert!(SnapshotDiff.skips_clean_saves());
    }
}
