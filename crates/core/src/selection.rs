use std::collections::{BTreeMap, BTreeSet};

use crate::group::{ClusterId, DuplicateGroup};
use crate::record::{Record, RecordId};

/// Per-cluster sets of records marked for removal.
///
/// Invariant: no cluster maps to an empty set. A key is removed as soon
/// as its last record is deselected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionLedger {
    entries: BTreeMap<ClusterId, BTreeSet<RecordId>>,
}

impl SelectionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark or unmark `record` for removal within `cluster`.
    /// Keyed by record id, so the same logical record reached twice dedupes.
    pub fn toggle(&mut self, cluster: ClusterId, record: &Record, selected: bool) {
        if selected {
            self.entries
                .entry(cluster)
                .or_default()
                .insert(record.id.clone());
            return;
        }

        if let Some(set) = self.entries.get_mut(&cluster) {
            set.remove(&record.id);
            if set.is_empty() {
                self.entries.remove(&cluster);
            }
        }
    }

    /// Mark every member except the first for removal, in every group.
    /// Replaces whatever was selected before for those clusters.
    pub fn select_all_except_first(&mut self, groups: &[DuplicateGroup]) {
        for group in groups {
            let rest: BTreeSet<RecordId> = group
                .members
                .iter()
                .skip(1)
                .filter(|m| Some(&m.id) != group.survivor().map(|s| &s.id))
                .map(|m| m.id.clone())
                .collect();

            if rest.is_empty() {
                self.entries.remove(&group.cluster_id);
            } else {
                self.entries.insert(group.cluster_id, rest);
            }
        }
    }

    pub fn is_selected(&self, cluster: ClusterId, id: &RecordId) -> bool {
        self.entries
            .get(&cluster)
            .is_some_and(|set| set.contains(id))
    }

    /// Every marked id, flattened across clusters.
    pub fn removal_ids(&self) -> BTreeSet<RecordId> {
        self.entries
            .values()
            .flat_map(|set| set.iter().cloned())
            .collect()
    }

    pub fn clusters(&self) -> impl Iterator<Item = ClusterId> + '_ {
        self.entries.keys().copied()
    }

    /// Total marked records across all clusters.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// True when no cluster key holds an empty set.
    pub fn holds_no_empty_sets(&self) -> bool {
        self.entries.values().all(|set| !set.is_empty())
    }
}
