//! `dedupe-review`: the review/training orchestrator.
//!
//! Sequences column selection, active-learning batches, group review and
//! reprocessing, and reconciles selections into exports. Talks to the
//! matching service only through `dedupe_client::DedupService`.

pub mod error;
pub mod export;
pub mod labels;
pub mod navigator;
pub mod reprocess;
pub mod training;
pub mod workflow;

pub use error::WorkflowError;
pub use export::{build_export, ExportFile, ExportMode, ExportTable};
pub use labels::LabelLog;
pub use navigator::{ReviewSession, SortOrder};
pub use reprocess::derive_pairs;
pub use training::{StartRefusal, TrainingProgress, TrainingSession};
pub use workflow::{
    AppState, LoadedDataset, Notice, Submission, SubmissionKind, TrainingStage, Workflow,
    NO_DUPLICATES_MESSAGE,
};
