use std::fmt;

use dedupe_core::ValidationError;

/// Failure turning an uploaded file into rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// File could not be read
    Io(String),
    /// Malformed delimited text
    Csv(String),
    /// Workbook could not be opened or its first sheet read
    Excel(String),
    /// No header row
    Empty(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Io(msg) => write!(f, "Read error: {}", msg),
            DecodeError::Csv(msg) => write!(f, "CSV error: {}", msg),
            DecodeError::Excel(msg) => write!(f, "Excel error: {}", msg),
            DecodeError::Empty(name) => write!(f, "No data found in {}", name),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Anything that stops an upload from becoming a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    Invalid(ValidationError),
    Decode(DecodeError),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::Invalid(e) => e.fmt(f),
            UploadError::Decode(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for UploadError {}

impl From<ValidationError> for UploadError {
    fn from(e: ValidationError) -> Self {
        UploadError::Invalid(e)
    }
}

impl From<DecodeError> for UploadError {
    fn from(e: DecodeError) -> Self {
        UploadError::Decode(e)
    }
}
