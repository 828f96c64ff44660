//! Training Session: one batch of candidate pairs being labeled.
//!
//! Pairs are shown one at a time; each label advances the cursor and is
//! never revisited. The batch is exhausted once every pair has a label.

use serde_json::Value;

use dedupe_config::TrainingSettings;
use dedupe_core::{Answer, TrainingPair};

use crate::error::WorkflowError;

/// Why a batch was not turned into a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartRefusal {
    /// Fewer pairs than `min_batch_pairs`.
    TooSmall { pairs: usize, minimum: usize },
    /// A pair could not be read; carries a message naming it.
    InvalidData(String),
}

/// Label counts for display and finish gating. `total` excludes unsure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingProgress {
    pub yes: usize,
    pub no: usize,
    pub unsure: usize,
    pub total: usize,
    pub labeled: usize,
    pub batch_len: usize,
    pub min_yes: usize,
    pub min_no: usize,
    pub min_total: usize,
}

impl TrainingProgress {
    pub fn can_finish(&self) -> bool {
        self.yes >= self.min_yes && self.no >= self.min_no && self.total >= self.min_total
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSession {
    pairs: Vec<TrainingPair>,
    labels: Vec<Answer>,
    thresholds: TrainingSettings,
    dispatched: bool,
}

impl TrainingSession {
    /// Parse a batch from the service. The whole batch is checked up front so
    /// a malformed pair halts the batch before any labeling starts.
    pub fn start(raw: Vec<Value>, thresholds: &TrainingSettings) -> Result<Self, StartRefusal> {
        if raw.len() < thresholds.min_batch_pairs {
            return Err(StartRefusal::TooSmall {
                pairs: raw.len(),
                minimum: thresholds.min_batch_pairs,
            });
        }

        let mut pairs = Vec::with_capacity(raw.len());
        for (i, value) in raw.into_iter().enumerate() {
            let pair = TrainingPair::from_wire(value)
                .map_err(|e| StartRefusal::InvalidData(format!("pair {}: {}", i + 1, e)))?;
            pairs.push(pair);
        }

        log::info!("training batch started with {} pairs", pairs.len());
        Ok(Self {
            pairs,
            labels: Vec::new(),
            thresholds: thresholds.clone(),
            dispatched: false,
        })
    }

    /// The pair awaiting a label, while the batch is displayable.
    pub fn current(&self) -> Option<&TrainingPair> {
        self.pairs.get(self.labels.len())
    }

    pub fn cursor(&self) -> usize {
        self.labels.len()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.labels.len() >= self.pairs.len()
    }

    /// Label the current pair and advance. Returns true when this label
    /// exhausted the batch.
    pub fn record_response(&mut self, answer: Answer) -> Result<bool, WorkflowError> {
        if self.is_exhausted() {
            return Err(WorkflowError::NotAvailable("every pair in this batch is labeled"));
        }
        self.labels.push(answer);
        log::debug!("pair {}/{} labeled {}", self.labels.len(), self.pairs.len(), answer);
        Ok(self.is_exhausted())
    }

    pub fn progress(&self) -> TrainingProgress {
        let count = |a: Answer| self.labels.iter().filter(|&&l| l == a).count();
        let yes = count(Answer::Yes);
        let no = count(Answer::No);
        TrainingProgress {
            yes,
            no,
            unsure: count(Answer::Unsure),
            total: yes + no,
            labeled: self.labels.len(),
            batch_len: self.pairs.len(),
            min_yes: self.thresholds.min_yes,
            min_no: self.thresholds.min_no,
            min_total: self.thresholds.min_total,
        }
    }

    pub fn can_finish(&self) -> bool {
        self.progress().can_finish()
    }

    /// At least one yes or no has been given.
    pub fn has_signal(&self) -> bool {
        self.labels.iter().any(|a| a.is_signal())
    }

    /// Labeled pairs to send back, unsure ones dropped.
    pub fn labeled_pairs(&self) -> Vec<TrainingPair> {
        self.pairs
            .iter()
            .zip(&self.labels)
            .filter(|(_, answer)| answer.is_signal())
            .map(|(pair, &answer)| pair.clone().with_answer(answer))
            .collect()
    }

    /// Claim the automatic end-of-batch submission. Succeeds once per batch.
    pub(crate) fn claim_dispatch(&mut self) -> bool {
        if self.dispatched || !self.is_exhausted() {
            return false;
        }
        self.dispatched = true;
        true
    }
}
