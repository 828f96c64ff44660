//! Group Review Navigator.
//!
//! Walks a sorted view of the result set one group at a time. The cursor
//! keeps a high-water mark (`max_visited`) that never moves backwards; it
//! gates reprocessing together with the current position.

use std::collections::BTreeSet;
use std::fmt;

use dedupe_core::{ClusterId, DuplicateGroup, SelectionLedger, TrainingPair};

use crate::error::WorkflowError;
use crate::reprocess::derive_pairs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    ConfidenceDesc,
    ConfidenceAsc,
    #[default]
    ClusterId,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desc" | "confidence-desc" => Some(Self::ConfidenceDesc),
            "asc" | "confidence-asc" => Some(Self::ConfidenceAsc),
            "id" | "cluster" | "cluster-id" => Some(Self::ClusterId),
            _ => None,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfidenceDesc => write!(f, "confidence-desc"),
            Self::ConfidenceAsc => write!(f, "confidence-asc"),
            Self::ClusterId => write!(f, "cluster-id"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSession {
    groups: Vec<DuplicateGroup>,
    order: Vec<usize>,
    sort: SortOrder,
    current: usize,
    max_visited: usize,
    skipped: BTreeSet<ClusterId>,
    selection: SelectionLedger,
}

impl ReviewSession {
    /// Returns None for an empty result set; reviewing never holds zero groups.
    pub fn new(groups: Vec<DuplicateGroup>) -> Option<Self> {
        if groups.is_empty() {
            return None;
        }
        let mut session = Self {
            order: (0..groups.len()).collect(),
            groups,
            sort: SortOrder::default(),
            current: 0,
            max_visited: 0,
            skipped: BTreeSet::new(),
            selection: SelectionLedger::new(),
        };
        session.apply_sort();
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn max_visited(&self) -> usize {
        self.max_visited
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    pub fn current_group(&self) -> &DuplicateGroup {
        &self.groups[self.order[self.current]]
    }

    /// Groups in the current sort order.
    pub fn sorted(&self) -> impl Iterator<Item = &DuplicateGroup> + '_ {
        self.order.iter().map(|&i| &self.groups[i])
    }

    /// Groups as received, which is what exports are built from.
    pub fn groups(&self) -> &[DuplicateGroup] {
        &self.groups
    }

    pub fn selection(&self) -> &SelectionLedger {
        &self.selection
    }

    pub fn skipped(&self) -> &BTreeSet<ClusterId> {
        &self.skipped
    }

    pub fn is_skipped(&self, cluster: ClusterId) -> bool {
        self.skipped.contains(&cluster)
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 >= self.groups.len()
    }

    pub fn next(&mut self) {
        if !self.is_last() {
            self.current += 1;
            self.max_visited = self.max_visited.max(self.current);
        }
    }

    pub fn previous(&mut self) {
        self.current = self.current.saturating_sub(1);
    }

    pub fn skip(&mut self) {
        self.skipped.insert(self.current_group().cluster_id);
        self.next();
    }

    pub fn unskip(&mut self) {
        let cluster = self.current_group().cluster_id;
        self.skipped.remove(&cluster);
    }

    /// Change the sort key. The cursor returns to the first group; the
    /// high-water mark is kept.
    pub fn set_sort(&mut self, sort: SortOrder) {
        if sort == self.sort {
            return;
        }
        self.sort = sort;
        self.apply_sort();
        self.current = 0;
    }

    /// Mark or unmark the member at `position` of the current group for removal.
    pub fn toggle_member(&mut self, position: usize, selected: bool) -> Result<(), WorkflowError> {
        let group = &self.groups[self.order[self.current]];
        let record = group
            .members
            .get(position)
            .ok_or(WorkflowError::NotAvailable("no such member in the current group"))?;
        self.selection.toggle(group.cluster_id, record, selected);
        Ok(())
    }

    pub fn select_all_except_first(&mut self) {
        self.selection.select_all_except_first(&self.groups);
    }

    pub fn can_reprocess(&self, min_reviewed: usize) -> bool {
        self.max_visited >= min_reviewed && self.current >= min_reviewed
    }

    /// Groups before the cursor that were not skipped.
    pub fn processed(&self) -> impl Iterator<Item = &DuplicateGroup> + '_ {
        self.order[..self.current]
            .iter()
            .map(|&i| &self.groups[i])
            .filter(|g| !self.skipped.contains(&g.cluster_id))
    }

    /// Pairs inferred from the review so far. Guarded by `can_reprocess`.
    pub fn reprocess_pairs(&self, min_reviewed: usize) -> Result<Vec<TrainingPair>, WorkflowError> {
        if !self.can_reprocess(min_reviewed) {
            return Err(WorkflowError::NotAvailable("review more groups before reprocessing"));
        }
        Ok(derive_pairs(self.processed(), &self.selection))
    }

    fn apply_sort(&mut self) {
        let groups = &self.groups;
        let by_id = |a: &usize, b: &usize| groups[*a].cluster_id.cmp(&groups[*b].cluster_id);
        match self.sort {
            SortOrder::ClusterId => self.order.sort_by(by_id),
            SortOrder::ConfidenceDesc => self.order.sort_by(|a, b| {
                groups[*b]
                    .confidence
                    .total_cmp(&groups[*a].confidence)
                    .then_with(|| by_id(a, b))
            }),
            SortOrder::ConfidenceAsc => self.order.sort_by(|a, b| {
                groups[*a]
                    .confidence
                    .total_cmp(&groups[*b].confidence)
                    .then_with(|| by_id(a, b))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dedupe_core::{Fields, Record, RecordId};

    fn group(id: u64, confidence: f64, size: usize) -> DuplicateGroup {
        let members = (0..size)
            .map(|i| Record::new(RecordId::new(id as usize * 10 + i, "a.csv"), Fields::new()))
            .collect();
        DuplicateGroup::new(ClusterId(id), confidence, members)
    }

    fn session(n: u64) -> ReviewSession {
        ReviewSession::new((0..n).map(|i| group(i, 0.5, 2)).collect()).unwrap()
    }

    #[test]
    fn empty_result_has_no_session() {
        assert!(ReviewSession::new(Vec::new()).is_none());
    }

    #[test]
    fn next_and_previous_track_high_water_mark() {
        let mut s = session(4);
        s.next();
        s.next();
        s.previous();
        assert_eq!((s.current_index(), s.max_visited()), (1, 2));
        s.previous();
        s.previous();
        assert_eq!((s.current_index(), s.max_visited()), (0, 2));
        for _ in 0..10 {
            s.next();
        }
        assert_eq!((s.current_index(), s.max_visited()), (3, 3));
    }

    #[test]
    fn skip_advances_and_unskip_stays() {
        let mut s = session(3);
        s.skip();
        assert!(s.is_skipped(ClusterId(0)));
        assert_eq!(s.current_index(), 1);
        s.previous();
        s.unskip();
        assert!(!s.is_skipped(ClusterId(0)));
        assert_eq!(s.current_index(), 0);
    }

    #[test]
    fn skip_on_last_group_stays_put() {
        let mut s = session(2);
        s.next();
        s.skip();
        assert_eq!(s.current_index(), 1);
        assert!(s.is_skipped(ClusterId(1)));
    }

    #[test]
    fn sort_orders_are_stable_by_cluster_id() {
        let groups = vec![group(3, 0.7, 2), group(1, 0.9, 2), group(2, 0.7, 2), group(0, 0.5, 2)];
        let mut s = ReviewSession::new(groups).unwrap();
        let ids = |s: &ReviewSession| s.sorted().map(|g| g.cluster_id.0).collect::<Vec<_>>();

        assert_eq!(ids(&s), vec![0, 1, 2, 3]);
        s.set_sort(SortOrder::ConfidenceDesc);
        assert_eq!(ids(&s), vec![1, 2, 3, 0]);
        s.set_sort(SortOrder::ConfidenceAsc);
        assert_eq!(ids(&s), vec![0, 2, 3, 1]);
    }

    #[test]
    fn set_sort_resets_cursor_not_mark() {
        let mut s = session(4);
        s.next();
        s.next();
        s.set_sort(SortOrder::ConfidenceAsc);
        assert_eq!((s.current_index(), s.max_visited()), (0, 2));
    }

    #[test]
    fn reprocess_guard() {
        let mut s = session(8);
        for _ in 0..5 {
            s.next();
        }
        assert!(s.can_reprocess(5));
        s.previous();
        assert!(!s.can_reprocess(5));
        assert!(matches!(s.reprocess_pairs(5), Err(WorkflowError::NotAvailable(_))));
    }

    #[test]
    fn processed_excludes_skipped_and_unvisited() {
        let mut s = session(8);
        s.next();
        s.skip();
        for _ in 0..4 {
            s.next();
        }
        let ids: Vec<u64> = s.processed().map(|g| g.cluster_id.0).collect();
        assert_eq!(ids, vec![0, 2, 3, 4, 5]);
        // 5 processed two-member groups, nothing removed
        assert_eq!(s.reprocess_pairs(5).unwrap().len(), 5);
    }

    #[test]
    fn toggle_member_uses_current_group() {
        let mut s = session(2);
        s.next();
        s.toggle_member(1, true).unwrap();
        assert!(s.selection().is_selected(ClusterId(1), &RecordId::new(11, "a.csv")));
        assert!(s.toggle_member(5, true).is_err());
        s.toggle_member(1, false).unwrap();
        assert!(s.selection().is_empty());
    }
}
