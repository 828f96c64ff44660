//! The orchestrator: one owner for every store, mutated only by named actions.
//!
//! Submissions are two-phase. An action that needs the matching service
//! returns a [`Submission`] ticket and marks it in flight; nothing else is
//! mutated until [`Workflow::complete`] is called with the outcome. A
//! failed outcome therefore only clears the in-flight mark and sets a
//! notice, which is the rollback.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::Value;

use dedupe_client::{DedupRequest, DedupResponse, DedupService, RemoteFailure, Upload};
use dedupe_config::{with_csv_extension, ExportSettings, ReviewSettings, Settings, TrainingSettings};
use dedupe_core::{
    Answer, ColumnSelection, DatasetLedger, DuplicateGroup, RecordId, SourceRows, TrainingPair,
};

use crate::error::WorkflowError;
use crate::export::{build_export, ExportFile, ExportMode};
use crate::labels::LabelLog;
use crate::navigator::ReviewSession;
use crate::training::{StartRefusal, TrainingSession};

pub const NO_DUPLICATES_MESSAGE: &str = "No duplicates found. Need more training data.";

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TrainingStage {
    Labeling(TrainingSession),
    /// The service sent fewer pairs than a batch needs.
    TooSmall { pairs: usize, minimum: usize },
    /// The batch contained a malformed pair; labeling halted.
    InvalidData { reason: String },
    /// The last result had no groups.
    NoDuplicates,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AppState {
    #[default]
    Initial,
    Training(TrainingStage),
    Reviewing(ReviewSession),
}

impl AppState {
    pub fn name(&self) -> &'static str {
        match self {
            AppState::Initial => "initial",
            AppState::Training(_) => "training",
            AppState::Reviewing(_) => "reviewing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Info(m) | Notice::Error(m) => m,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

/// The uploaded file(s) as submitted, plus the ledger of their rows.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub upload: Upload,
    pub ledger: DatasetLedger,
    /// Fields offered for matching.
    pub columns: Vec<String>,
}

impl LoadedDataset {
    pub fn new(upload: Upload, sources: Vec<SourceRows>, columns: Vec<String>) -> Self {
        Self {
            upload,
            ledger: DatasetLedger::from_sources(sources),
            columns,
        }
    }
}

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    /// First call, or a fresh call from the training state
    Discover,
    /// End of a training batch, or "finish"
    Train,
    /// Retraining from review decisions
    Reprocess,
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionKind::Discover => write!(f, "discover"),
            SubmissionKind::Train => write!(f, "train"),
            SubmissionKind::Reprocess => write!(f, "reprocess"),
        }
    }
}

/// Ticket for one outstanding service call.
#[derive(Debug, Clone)]
pub struct Submission {
    id: u64,
    kind: SubmissionKind,
    request: DedupRequest,
    /// Batch labels that join the label log once the call succeeds.
    pending_labels: Vec<TrainingPair>,
}

impl Submission {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> SubmissionKind {
        self.kind
    }

    pub fn request(&self) -> &DedupRequest {
        &self.request
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Workflow {
    training: TrainingSettings,
    review: ReviewSettings,
    export: ExportSettings,
    dataset: Option<LoadedDataset>,
    columns: ColumnSelection,
    labels: LabelLog,
    state: AppState,
    in_flight: Option<u64>,
    last_ticket: u64,
    notice: Option<Notice>,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl Workflow {
    pub fn new(settings: &Settings) -> Self {
        Self {
            training: settings.training.clone(),
            review: settings.review.clone(),
            export: settings.export.clone(),
            dataset: None,
            columns: ColumnSelection::default(),
            labels: LabelLog::new(),
            state: AppState::Initial,
            in_flight: None,
            last_ticket: 0,
            notice: None,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn dataset(&self) -> Option<&LoadedDataset> {
        self.dataset.as_ref()
    }

    pub fn columns(&self) -> &ColumnSelection {
        &self.columns
    }

    pub fn label_log(&self) -> &LabelLog {
        &self.labels
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// A submission is outstanding; new submissions are refused.
    pub fn is_processing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn review_settings(&self) -> &ReviewSettings {
        &self.review
    }

    // -- Upload and columns --

    /// Replace the dataset. Everything derived from the previous one is reset.
    pub fn load_dataset(&mut self, dataset: LoadedDataset) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        log::info!(
            "dataset loaded: {} ({} rows from {} file(s), {} columns)",
            dataset.upload.file_name,
            dataset.ledger.len(),
            dataset.ledger.sources().len(),
            dataset.columns.len()
        );
        self.columns = ColumnSelection::new(dataset.columns.clone());
        self.dataset = Some(dataset);
        self.labels.clear();
        self.state = AppState::Initial;
        self.notice = None;
        Ok(())
    }

    pub fn column_selection_mut(&mut self) -> Result<&mut ColumnSelection, WorkflowError> {
        self.ensure_idle()?;
        Ok(&mut self.columns)
    }

    pub fn select_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), WorkflowError> {
        self.column_selection_mut()?.set(names)?;
        Ok(())
    }

    // -- Submissions --

    /// Ask the service for pairs or groups with the current selection.
    pub fn find_duplicates(&mut self) -> Result<Submission, WorkflowError> {
        self.ensure_idle()?;
        if matches!(self.state, AppState::Reviewing(_)) {
            return Err(WorkflowError::NotAvailable("already reviewing groups; reprocess instead"));
        }
        let data = (!self.labels.is_empty()).then(|| self.labels.entries().to_vec());
        self.begin(SubmissionKind::Discover, data, false, Vec::new())
    }

    /// Label the current pair. Returns the retraining submission when this
    /// label completes the batch with at least one yes or no; that happens
    /// at most once per batch.
    pub fn record_response(&mut self, answer: Answer) -> Result<Option<Submission>, WorkflowError> {
        self.ensure_idle()?;
        let dispatch = {
            let session = self.labeling_mut()?;
            session.record_response(answer)? && session.has_signal() && session.claim_dispatch()
        };
        if dispatch {
            return self.training_submission().map(Some);
        }
        Ok(None)
    }

    /// Submit the labels so far. Offered once the gating thresholds are met,
    /// and as a retry once a batch is exhausted with some signal.
    pub fn finish_training(&mut self) -> Result<Submission, WorkflowError> {
        self.ensure_idle()?;
        let session = self.labeling()?;
        let retry = session.is_exhausted() && session.has_signal();
        if !session.can_finish() && !retry {
            return Err(WorkflowError::NotAvailable(
                "label more pairs: at least 2 yes, 2 no and 15 answers in total",
            ));
        }
        self.training_submission()
    }

    /// Retrain from review decisions: derived pairs first, then the label log.
    pub fn reprocess(&mut self) -> Result<Submission, WorkflowError> {
        self.ensure_idle()?;
        let derived = self
            .reviewing()?
            .reprocess_pairs(self.review.min_reviewed_for_reprocess)?;
        let derived_count = derived.len();

        let mut data = derived;
        data.extend(self.labels.entries().iter().cloned());
        log::info!(
            "reprocess: {} derived pairs + {} logged labels",
            derived_count,
            self.labels.len()
        );
        self.begin(SubmissionKind::Reprocess, Some(data), true, Vec::new())
    }

    /// Apply the outcome of a submission. On failure nothing changes apart
    /// from the in-flight mark and the notice.
    pub fn complete(
        &mut self,
        ticket: Submission,
        outcome: Result<DedupResponse, RemoteFailure>,
    ) -> Result<(), WorkflowError> {
        if self.in_flight != Some(ticket.id) {
            log::warn!("ignoring result of stale submission #{}", ticket.id);
            return Err(WorkflowError::StaleSubmission);
        }
        self.in_flight = None;

        let response = match outcome {
            Ok(response) => response,
            Err(failure) => {
                log::warn!("submission #{} ({}) failed: {}", ticket.id, ticket.kind, failure);
                self.notice = Some(Notice::Error(failure.to_string()));
                return Err(WorkflowError::Remote(failure));
            }
        };

        if ticket.kind == SubmissionKind::Train {
            let added = self.labels.append(ticket.pending_labels);
            log::debug!("label log: +{} entries, {} total", added, self.labels.len());
        }

        match response {
            DedupResponse::NeedsTraining(raw) => self.start_training(raw),
            DedupResponse::Groups(groups) => {
                let groups = self.resolve_members(groups);
                match ReviewSession::new(groups) {
                    Some(review) => {
                        log::info!("reviewing {} groups", review.len());
                        self.state = AppState::Reviewing(review);
                    }
                    None => {
                        log::info!("service found no duplicates");
                        self.state = AppState::Training(TrainingStage::NoDuplicates);
                        self.notice = Some(Notice::Info(NO_DUPLICATES_MESSAGE.to_string()));
                    }
                }
                Ok(())
            }
        }
    }

    /// Submit and apply in one step.
    pub fn run(&mut self, ticket: Submission, service: &impl DedupService) -> Result<(), WorkflowError> {
        let outcome = service.submit(ticket.request());
        self.complete(ticket, outcome)
    }

    // -- Review --

    pub fn review(&self) -> Option<&ReviewSession> {
        match &self.state {
            AppState::Reviewing(review) => Some(review),
            _ => None,
        }
    }

    /// Navigation and selection. Refused while a submission is in flight.
    pub fn review_mut(&mut self) -> Result<&mut ReviewSession, WorkflowError> {
        self.ensure_idle()?;
        match &mut self.state {
            AppState::Reviewing(review) => Ok(review),
            _ => Err(WorkflowError::NotAvailable("no groups to review")),
        }
    }

    pub fn training_session(&self) -> Option<&TrainingSession> {
        match &self.state {
            AppState::Training(TrainingStage::Labeling(session)) => Some(session),
            _ => None,
        }
    }

    // -- Export --

    pub fn export(&self, mode: ExportMode) -> Result<ExportFile, WorkflowError> {
        let review = self.reviewing()?;
        let exclude = match mode {
            ExportMode::All => BTreeSet::new(),
            ExportMode::Cleansed => review.selection().removal_ids(),
        };
        let file_name = match mode {
            ExportMode::All => self.export.all_file_name(),
            ExportMode::Cleansed => self.export.cleansed_file_name(),
        };
        self.export_named(file_name, &exclude)
    }

    /// Export under an explicit name; `.csv` is appended when missing.
    pub fn export_as(&self, mode: ExportMode, name: &str) -> Result<ExportFile, WorkflowError> {
        let mut file = self.export(mode)?;
        file.file_name = with_csv_extension(name);
        Ok(file)
    }

    fn export_named(
        &self,
        file_name: String,
        exclude: &BTreeSet<RecordId>,
    ) -> Result<ExportFile, WorkflowError> {
        let review = self.reviewing()?;
        let dataset = self
            .dataset
            .as_ref()
            .ok_or(WorkflowError::NotAvailable("no dataset loaded"))?;
        let table = build_export(review.groups(), &dataset.ledger, exclude);
        let rows = table.rows.len();
        log::info!("export {}: {} rows ({} excluded)", file_name, rows, exclude.len());
        Ok(ExportFile { file_name, contents: table.to_csv()?, rows })
    }

    /// Back to a blank session. An in-flight submission becomes stale.
    pub fn clear_all(&mut self) {
        if let Some(id) = self.in_flight.take() {
            log::info!("clearing with submission #{} outstanding", id);
        }
        self.dataset = None;
        self.columns = ColumnSelection::default();
        self.labels.clear();
        self.state = AppState::Initial;
        self.notice = None;
    }

    // -- Internals --

    fn ensure_idle(&self) -> Result<(), WorkflowError> {
        if self.in_flight.is_some() {
            return Err(WorkflowError::Busy);
        }
        Ok(())
    }

    fn labeling(&self) -> Result<&TrainingSession, WorkflowError> {
        self.training_session()
            .ok_or(WorkflowError::NotAvailable("no training pairs to label"))
    }

    fn labeling_mut(&mut self) -> Result<&mut TrainingSession, WorkflowError> {
        match &mut self.state {
            AppState::Training(TrainingStage::Labeling(session)) => Ok(session),
            _ => Err(WorkflowError::NotAvailable("no training pairs to label")),
        }
    }

    fn reviewing(&self) -> Result<&ReviewSession, WorkflowError> {
        self.review()
            .ok_or(WorkflowError::NotAvailable("no groups to review"))
    }

    fn training_submission(&mut self) -> Result<Submission, WorkflowError> {
        let batch = self.labeling()?.labeled_pairs();
        let mut data = self.labels.entries().to_vec();
        data.extend(batch.iter().cloned());
        self.begin(SubmissionKind::Train, Some(data), false, batch)
    }

    fn begin(
        &mut self,
        kind: SubmissionKind,
        training_data: Option<Vec<TrainingPair>>,
        is_reprocessing: bool,
        pending_labels: Vec<TrainingPair>,
    ) -> Result<Submission, WorkflowError> {
        self.ensure_idle()?;
        let dataset = self
            .dataset
            .as_ref()
            .ok_or(WorkflowError::NotAvailable("upload a file first"))?;
        let columns = self.columns.validated()?;
        let request = DedupRequest::new(dataset.upload.clone(), columns, training_data, is_reprocessing)?;

        self.last_ticket += 1;
        let id = self.last_ticket;
        self.in_flight = Some(id);
        self.notice = None;
        log::info!(
            "submission #{} ({}) with {} labeled pairs",
            id,
            kind,
            request.labeled_pair_count()
        );

        Ok(Submission { id, kind, request, pending_labels })
    }

    fn start_training(&mut self, raw: Vec<Value>) -> Result<(), WorkflowError> {
        match TrainingSession::start(raw, &self.training) {
            Ok(session) => {
                self.state = AppState::Training(TrainingStage::Labeling(session));
                Ok(())
            }
            Err(StartRefusal::TooSmall { pairs, minimum }) => {
                log::info!("training batch too small: {} pairs", pairs);
                self.state = AppState::Training(TrainingStage::TooSmall { pairs, minimum });
                self.notice = Some(Notice::Info(format!(
                    "Dataset too small for training: needs at least {minimum} pairs, got {pairs}"
                )));
                Ok(())
            }
            Err(StartRefusal::InvalidData(reason)) => {
                log::warn!("invalid training data: {}", reason);
                self.state = AppState::Training(TrainingStage::InvalidData { reason: reason.clone() });
                self.notice = Some(Notice::Error(format!("Invalid training data: {reason}")));
                Err(WorkflowError::DataShape(reason))
            }
        }
    }

    /// Members reached through a response get their source tag from the ledger.
    fn resolve_members(&self, mut groups: Vec<DuplicateGroup>) -> Vec<DuplicateGroup> {
        if let Some(dataset) = &self.dataset {
            for member in groups.iter_mut().flat_map(|g| g.members.iter_mut()) {
                member.id = dataset.ledger.resolve(&member.id);
            }
        }
        groups
    }
}
