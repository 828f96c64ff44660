//! `dedupe-core`: data model shared by the review tool.
//!
//! Records, duplicate groups, training pairs, and the two ledgers the
//! reviewer mutates (dataset and selection). Pure data: no IO, no HTTP.

pub mod columns;
pub mod dataset;
pub mod error;
pub mod group;
pub mod pair;
pub mod record;
pub mod selection;

pub use columns::{ColumnMapping, ColumnSelection, CompletedMapping, FileSlot, validate_field_selection};
pub use dataset::{DatasetLedger, SourceRows};
pub use error::ValidationError;
pub use group::{ClusterId, DuplicateGroup};
pub use pair::{Answer, PairShapeError, TrainingPair};
pub use record::{format_value, Fields, Record, RecordId, RecordShapeError, RESERVED_FIELDS};
pub use selection::SelectionLedger;
