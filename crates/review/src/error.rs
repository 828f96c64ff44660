use std::fmt;

use dedupe_client::RemoteFailure;
use dedupe_core::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Rejected input; nothing was sent and nothing changed.
    Validation(ValidationError),
    /// The matching service call failed; state was rolled back.
    Remote(RemoteFailure),
    /// Candidate pairs were malformed; labeling halted for that batch.
    DataShape(String),
    /// A submission is already in flight.
    Busy,
    /// Completion for a submission that is no longer the in-flight one.
    StaleSubmission,
    /// Action invoked in the wrong state or before its guard passes.
    NotAvailable(&'static str),
    /// Export could not be serialized or written.
    Export(String),
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "{e}"),
            Self::Remote(e) => write!(f, "{e}"),
            Self::DataShape(msg) => write!(f, "invalid training data: {msg}"),
            Self::Busy => write!(f, "a request is already being processed"),
            Self::StaleSubmission => write!(f, "response belongs to a superseded request"),
            Self::NotAvailable(why) => write!(f, "not available: {why}"),
            Self::Export(msg) => write!(f, "export failed: {msg}"),
        }
    }
}

impl std::error::Error for WorkflowError {}

impl From<ValidationError> for WorkflowError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<RemoteFailure> for WorkflowError {
    fn from(e: RemoteFailure) -> Self {
        Self::Remote(e)
    }
}
