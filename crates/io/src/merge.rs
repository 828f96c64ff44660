//! Two-file merge.
//!
//! The narrower file's columns are renamed onto the wider file's header
//! through a completed mapping, and both are written out as a single CSV
//! upload. Target rows come first, so row indices in the merged upload
//! match the order of the sources handed to the dataset ledger.

use serde_json::Value;

use dedupe_client::Upload;
use dedupe_core::{CompletedMapping, Fields, FileSlot, SourceRows};

use crate::error::DecodeError;
use crate::upload::DecodedFile;

/// Result of merging two files: what gets submitted, and what the ledger keeps.
#[derive(Debug, Clone)]
pub struct MergedUpload {
    pub upload: Upload,
    /// Target file first, then source, each tagged with its own file name.
    pub sources: Vec<SourceRows>,
    /// Columns that both files feed.
    pub shared_columns: Vec<String>,
}

pub fn merge(
    first: &DecodedFile,
    second: &DecodedFile,
    mapping: &CompletedMapping,
) -> Result<MergedUpload, DecodeError> {
    let (source, target) = match mapping.source_slot {
        FileSlot::First => (first, second),
        FileSlot::Second => (second, first),
    };
    let columns = &mapping.target_columns;

    let target_rows: Vec<Fields> = target
        .table
        .rows
        .iter()
        .map(|row| project(columns, |col| row.get(col)))
        .collect();

    let source_rows: Vec<Fields> = source
        .table
        .rows
        .iter()
        .map(|row| {
            project(columns, |col| {
                mapping
                    .mappings
                    .iter()
                    .find(|(_, t)| t.as_str() == col)
                    .and_then(|(s, _)| row.get(s))
            })
        })
        .collect();

    let bytes = write_csv(columns, target_rows.iter().chain(source_rows.iter()))?;
    let file_name = format!("{}_merged.csv", stem(&target.file_name));
    log::info!(
        "merged {} ({} rows) and {} ({} rows) into {}",
        target.file_name,
        target_rows.len(),
        source.file_name,
        source_rows.len(),
        file_name
    );

    Ok(MergedUpload {
        upload: Upload::new(file_name, bytes),
        sources: vec![
            SourceRows::new(target.file_name.clone(), target_rows),
            SourceRows::new(source.file_name.clone(), source_rows),
        ],
        shared_columns: mapping.shared_columns(),
    })
}

fn project<'a>(columns: &[String], lookup: impl Fn(&str) -> Option<&'a Value>) -> Fields {
    columns
        .iter()
        .map(|col| (col.clone(), lookup(col).cloned().unwrap_or(Value::Null)))
        .collect()
}

fn write_csv<'a>(
    columns: &[String],
    rows: impl Iterator<Item = &'a Fields>,
) -> Result<Vec<u8>, DecodeError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(columns)
        .map_err(|e| DecodeError::Csv(e.to_string()))?;
    for row in rows {
        let record: Vec<String> = columns
            .iter()
            .map(|col| row.get(col).map(raw_text).unwrap_or_default())
            .collect();
        writer
            .write_record(&record)
            .map_err(|e| DecodeError::Csv(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| DecodeError::Csv(e.to_string()))
}

// Unlike export formatting, data values pass through unchanged.
fn raw_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name,
    }
}
