//! Snapshot content distributed for a collection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Point-in-time content of one collection: resource key to structured value.
///
/// Equality is structural over keys and values; there is no subset matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotContent(BTreeMap<String, Value>);

impl SnapshotContent {
    /// Creates empty content.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns the content with one more entry.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Inserts or replaces an entry, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the content has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SnapshotContent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        formatter.write_str(&rendered)
    }
}

/// Collapses consecutive identical snapshots into one.
#[must_use]
pub fn distinct_snapshots(mut snapshots: Vec<SnapshotContent>) -> Vec<SnapshotContent> {
    snapshots.dedup();
    snapshots
}
