//! Per-collection distribution history shared by the server and its
//! connections.

use crate::harness::domain::{MESH_CONFIG_COLLECTION, SnapshotContent};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Snapshots distributed so far, in order, per collection.
#[derive(Debug, Default)]
pub(crate) struct DistributionState {
    ready: bool,
    history: HashMap<String, Vec<SnapshotContent>>,
}

impl DistributionState {
    /// Returns whether the first config scan has completed.
    pub(crate) const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Marks the state ready without waiting for a config scan.
    pub(crate) const fn mark_ready(&mut self) {
        self.ready = true;
    }

    /// Appends `content` unless it equals the collection's latest snapshot.
    ///
    /// Returns whether a snapshot was appended.
    pub(crate) fn publish(&mut self, collection: &str, content: SnapshotContent) -> bool {
        let history = self.history.entry(collection.to_owned()).or_default();
        if history.last() == Some(&content) {
            return false;
        }
        history.push(content);
        true
    }

    /// Publishes the result of a full config scan and marks the state ready.
    ///
    /// Collections that were distributed before but are absent from `scanned`
    /// receive an empty snapshot. The mesh config is never touched here.
    pub(crate) fn apply_scan(&mut self, scanned: BTreeMap<String, SnapshotContent>) {
        let vanished: Vec<String> = self
            .history
            .keys()
            .filter(|collection| {
                collection.as_str() != MESH_CONFIG_COLLECTION && !scanned.contains_key(*collection)
            })
            .cloned()
            .collect();

        for (collection, content) in scanned {
            if self.publish(&collection, content) {
                debug!(%collection, "published snapshot");
            }
        }
        for collection in vanished {
            if self.publish(&collection, SnapshotContent::new()) {
                debug!(%collection, "published empty snapshot");
            }
        }
        self.ready = true;
    }

    /// Returns the snapshots distributed for `collection`, oldest first.
    pub(crate) fn snapshots(&self, collection: &str) -> Vec<SnapshotContent> {
        self.history.get(collection).cloned().unwrap_or_default()
    }
}
