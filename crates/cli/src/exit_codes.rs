//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract. Scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, bad columns)  |
//! | 3-9     | upload           | File validation, decoding, merging       |
//! | 10-19   | remote           | Matching service failures                |
//! | 20-29   | review           | Training data and export failures        |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `workflow_exit_code` / `upload_exit_code`

use dedupe_client::RemoteFailure;
use dedupe_io::UploadError;
use dedupe_review::WorkflowError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, too few or unknown columns.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Upload (3-9)
// =============================================================================

/// Rejected file set: none, more than two, mixed or unsupported extensions.
pub const EXIT_UPLOAD_INVALID: u8 = 3;

/// A file could not be read or decoded.
pub const EXIT_UPLOAD_DECODE: u8 = 4;

/// Two-file column mapping left source columns unassigned.
pub const EXIT_UPLOAD_MAPPING: u8 = 5;

// =============================================================================
// Remote (10-19)
// =============================================================================

/// Cannot reach the matching service.
pub const EXIT_REMOTE_NETWORK: u8 = 10;

/// Matching service did not answer within the configured timeout.
pub const EXIT_REMOTE_TIMEOUT: u8 = 11;

/// Matching service answered with a non-200 status.
pub const EXIT_REMOTE_HTTP: u8 = 12;

/// Matching service answered with a body of unknown shape.
pub const EXIT_REMOTE_PARSE: u8 = 13;

// =============================================================================
// Review (20-29)
// =============================================================================

/// Candidate pairs in a training batch were malformed.
pub const EXIT_REVIEW_DATA_SHAPE: u8 = 20;

/// Export could not be serialized or written.
pub const EXIT_REVIEW_EXPORT: u8 = 21;

// =============================================================================
// Mapping
// =============================================================================

pub fn remote_exit_code(err: &RemoteFailure) -> u8 {
    match err {
        RemoteFailure::Network(_) => EXIT_REMOTE_NETWORK,
        RemoteFailure::Timeout(_) => EXIT_REMOTE_TIMEOUT,
        RemoteFailure::Http(..) => EXIT_REMOTE_HTTP,
        RemoteFailure::Parse(_) => EXIT_REMOTE_PARSE,
    }
}

pub fn upload_exit_code(err: &UploadError) -> u8 {
    match err {
        UploadError::Invalid(_) => EXIT_UPLOAD_INVALID,
        UploadError::Decode(_) => EXIT_UPLOAD_DECODE,
    }
}

pub fn workflow_exit_code(err: &WorkflowError) -> u8 {
    match err {
        WorkflowError::Validation(_) => EXIT_USAGE,
        WorkflowError::Remote(failure) => remote_exit_code(failure),
        WorkflowError::DataShape(_) => EXIT_REVIEW_DATA_SHAPE,
        WorkflowError::Export(_) => EXIT_REVIEW_EXPORT,
        WorkflowError::Busy | WorkflowError::StaleSubmission | WorkflowError::NotAvailable(_) => {
            EXIT_ERROR
        }
    }
}
