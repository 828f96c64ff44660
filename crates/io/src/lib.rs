// File I/O operations

pub mod csv;
pub mod error;
pub mod merge;
pub mod upload;
pub mod xlsx;

use dedupe_core::Fields;

pub use error::{DecodeError, UploadError};
pub use merge::{merge, MergedUpload};
pub use upload::{load_paths, validate_names, DecodedFile, FileKind};

/// Header row plus data rows of one decoded file.
/// Every row carries every header key, in header order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Fields>,
}
