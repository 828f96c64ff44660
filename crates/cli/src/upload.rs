//! Turning file arguments into a dataset: decode, map columns, merge.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use dedupe_core::{ColumnMapping, ValidationError};
use dedupe_io::{load_paths, merge, DecodedFile, UploadError};
use dedupe_review::LoadedDataset;

use crate::exit_codes::{EXIT_UPLOAD_DECODE, EXIT_UPLOAD_MAPPING, EXIT_USAGE};
use crate::CliError;

pub(crate) fn load(paths: &[PathBuf]) -> Result<Vec<DecodedFile>, CliError> {
    load_paths(paths).map_err(|e| match e {
        UploadError::Invalid(_) => CliError::upload(e)
            .with_hint("pass one or two .csv, .xlsx or .xls files with the same extension"),
        UploadError::Decode(_) => CliError::upload(e),
    })
}

/// Parse `--map SOURCE=TARGET` arguments.
pub(crate) fn parse_map_args(args: &[String]) -> Result<Vec<(String, String)>, CliError> {
    args.iter()
        .map(|arg| match arg.split_once('=') {
            Some((source, target)) if !source.trim().is_empty() && !target.trim().is_empty() => {
                Ok((source.trim().to_string(), target.trim().to_string()))
            }
            _ => Err(CliError::args(format!("invalid --map value: \"{}\"", arg))
                .with_hint("expected SOURCE=TARGET, e.g. --map 'Cust Name=Name 1'")),
        })
        .collect()
}

/// Seed the mapping for two files and apply explicit assignments.
pub(crate) fn seed_mapping(
    first: &DecodedFile,
    second: &DecodedFile,
    assignments: &[(String, String)],
) -> Result<ColumnMapping, CliError> {
    let mut mapping = ColumnMapping::auto(first.headers(), second.headers());
    for (source, target) in assignments {
        mapping.map(source, target).map_err(mapping_error)?;
    }
    Ok(mapping)
}

/// Ask for a target for every source column still unmapped. An empty
/// answer or end of input stops asking; completion then fails.
pub(crate) fn prompt_unmapped<R: BufRead, W: Write>(
    mapping: &mut ColumnMapping,
    input: &mut R,
    output: &mut W,
) -> Result<(), CliError> {
    while let Some(source) = mapping.unmapped().into_iter().next() {
        let free: Vec<&str> = mapping
            .target_columns()
            .iter()
            .map(String::as_str)
            .filter(|t| !mapping.source_columns().iter().any(|s| mapping.target_of(s) == Some(*t)))
            .collect();
        write!(output, "map \"{}\" to [{}]: ", source, free.join(", "))
            .and_then(|_| output.flush())
            .map_err(|e| CliError::io(e.to_string()))?;

        let mut line = String::new();
        let read = input.read_line(&mut line).map_err(|e| CliError::io(e.to_string()))?;
        let target = line.trim();
        if read == 0 || target.is_empty() {
            return Ok(());
        }
        if let Err(e) = mapping.map(&source, target) {
            writeln!(output, "error: {}", e).map_err(|e| CliError::io(e.to_string()))?;
        }
    }
    Ok(())
}

/// Build the dataset handed to the workflow. Two files are merged through
/// a completed column mapping; the selectable columns are the shared ones.
pub(crate) fn build_dataset<R: BufRead, W: Write>(
    mut files: Vec<DecodedFile>,
    assignments: &[(String, String)],
    input: &mut R,
    output: &mut W,
) -> Result<LoadedDataset, CliError> {
    if files.len() == 1 {
        if !assignments.is_empty() {
            return Err(CliError::args("--map needs two input files"));
        }
        let file = files.remove(0);
        return Ok(LoadedDataset::new(
            file.as_upload(),
            vec![file.source_rows()],
            file.headers().to_vec(),
        ));
    }

    let (first, second) = (&files[0], &files[1]);
    let mut mapping = seed_mapping(first, second, assignments)?;
    prompt_unmapped(&mut mapping, input, output)?;
    let completed = mapping.complete().map_err(mapping_error)?;

    let merged = merge(first, second, &completed)
        .map_err(|e| CliError { code: EXIT_UPLOAD_DECODE, message: e.to_string(), hint: None })?;
    log::info!(
        "merged {} and {} into {} ({} shared columns)",
        first.file_name,
        second.file_name,
        merged.upload.file_name,
        merged.shared_columns.len()
    );
    Ok(LoadedDataset::new(merged.upload, merged.sources, merged.shared_columns))
}

fn mapping_error(e: ValidationError) -> CliError {
    let code = match e {
        ValidationError::UnmappedColumns(_) => EXIT_UPLOAD_MAPPING,
        _ => EXIT_USAGE,
    };
    CliError { code, message: e.to_string(), hint: None }
        .with_hint("map every column of the narrower file with --map SOURCE=TARGET")
}
