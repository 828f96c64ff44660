//! Upload validation and loading.
//!
//! One or two files, same extension, CSV or Excel only. Validation runs
//! before anything is read, so a rejected upload has no side effects.

use std::fs;
use std::path::{Path, PathBuf};

use dedupe_client::Upload;
use dedupe_core::{SourceRows, ValidationError};

use crate::error::{DecodeError, UploadError};
use crate::DecodedTable;

pub const MAX_FILES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Excel,
}

impl FileKind {
    pub fn from_name(name: &str) -> Result<Self, ValidationError> {
        match extension_of(name).as_deref() {
            Some("csv") => Ok(FileKind::Csv),
            Some("xlsx") | Some("xls") => Ok(FileKind::Excel),
            _ => Err(ValidationError::UnsupportedFile(name.to_string())),
        }
    }
}

/// Lowercased extension without the dot.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Check file count and extensions of an upload.
pub fn validate_names<S: AsRef<str>>(names: &[S]) -> Result<FileKind, ValidationError> {
    let first = match names {
        [] => return Err(ValidationError::NoFiles),
        [first, ..] if names.len() <= MAX_FILES => first.as_ref(),
        _ => return Err(ValidationError::TooManyFiles(names.len())),
    };

    let kind = FileKind::from_name(first)?;
    if let Some(second) = names.get(1) {
        let second = second.as_ref();
        FileKind::from_name(second)?;
        let (a, b) = (extension_of(first), extension_of(second));
        if a != b {
            return Err(ValidationError::MixedExtensions {
                first: a.unwrap_or_default(),
                second: b.unwrap_or_default(),
            });
        }
    }
    Ok(kind)
}

/// A decoded upload file with its original bytes (sent as-is for single-file uploads).
#[derive(Debug, Clone)]
pub struct DecodedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub table: DecodedTable,
}

impl DecodedFile {
    pub fn decode(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, UploadError> {
        let file_name = file_name.into();
        let table = match FileKind::from_name(&file_name)? {
            FileKind::Csv => crate::csv::decode(&file_name, &bytes)?,
            FileKind::Excel => crate::xlsx::decode(&file_name, &bytes)?,
        };
        Ok(Self { file_name, bytes, table })
    }

    pub fn headers(&self) -> &[String] {
        &self.table.headers
    }

    pub fn row_count(&self) -> usize {
        self.table.rows.len()
    }

    pub fn source_rows(&self) -> SourceRows {
        SourceRows::new(self.file_name.clone(), self.table.rows.clone())
    }

    /// Submit the file unchanged.
    pub fn as_upload(&self) -> Upload {
        Upload::new(self.file_name.clone(), self.bytes.clone())
    }
}

/// Validate, read and decode one or two files from disk.
pub fn load_paths(paths: &[PathBuf]) -> Result<Vec<DecodedFile>, UploadError> {
    let names: Vec<String> = paths.iter().map(|p| file_name_of(p)).collect();
    validate_names(&names)?;

    let mut files = Vec::with_capacity(paths.len());
    for (path, name) in paths.iter().zip(names) {
        let bytes = fs::read(path)
            .map_err(|e| DecodeError::Io(format!("{}: {}", path.display(), e)))?;
        let file = DecodedFile::decode(name, bytes)?;
        log::info!(
            "loaded {} ({} rows, {} columns)",
            file.file_name,
            file.row_count(),
            file.headers().len()
        );
        files.push(file);
    }
    Ok(files)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
