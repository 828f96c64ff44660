//! Label Log: every explicit yes/no answer accepted by the service so far.
//!
//! Append-only: entries are added when a training submission succeeds and
//! are never edited. Reprocessing re-sends the whole log after the pairs it
//! derives from review decisions, so a reprocess request is reproducible
//! from the log plus the current review state.

use dedupe_core::{Answer, TrainingPair};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelLog {
    entries: Vec<TrainingPair>,
}

impl LabelLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append labeled pairs. Unlabeled and unsure pairs are dropped.
    /// Returns how many entries were added.
    pub fn append(&mut self, pairs: impl IntoIterator<Item = TrainingPair>) -> usize {
        let before = self.entries.len();
        self.entries.extend(
            pairs
                .into_iter()
                .filter(|p| p.answer.is_some_and(Answer::is_signal)),
        );
        self.entries.len() - before
    }

    pub fn entries(&self) -> &[TrainingPair] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, answer: Answer) -> usize {
        self.entries.iter().filter(|p| p.answer == Some(answer)).count()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
