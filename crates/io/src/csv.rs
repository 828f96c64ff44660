// CSV decoding into header + rows

use serde_json::Value;

use dedupe_core::Fields;

use crate::error::DecodeError;
use crate::DecodedTable;

/// Decode delimited text. The first non-blank line is the header row.
pub fn decode(file_name: &str, bytes: &[u8]) -> Result<DecodedTable, DecodeError> {
    let content = bytes_as_utf8(bytes);
    let delimiter = sniff_delimiter(&content);
    decode_str(file_name, &content, delimiter)
}

/// Delimiters seen in uploads: plain CSV, Excel in comma-decimal locales,
/// and tab-separated clipboard or ERP extracts.
const DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// Lines inspected when guessing the delimiter.
const SNIFF_LINES: usize = 10;

/// Guess the delimiter from the header and the first data lines.
///
/// A candidate must split the header into at least two fields. Among
/// those, the one whose field count holds on the most lines wins; wider
/// headers break ties, then the order of `DELIMITERS`.
pub fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();

    let mut best: Option<(usize, usize, u8)> = None;
    for delimiter in DELIMITERS {
        let widths: Vec<usize> = sample.iter().map(|line| field_count(line, delimiter)).collect();
        let Some(&header) = widths.first().filter(|&&w| w > 1) else {
            continue;
        };
        let agreeing = widths.iter().filter(|&&w| w == header).count();
        if best.map_or(true, |(a, h, _)| (agreeing, header) > (a, h)) {
            best = Some((agreeing, header, delimiter));
        }
    }
    best.map_or(b',', |(_, _, delimiter)| delimiter)
}

fn field_count(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(Result::ok)
        .map_or(1, |record| record.len())
}

/// UTF-8 if valid, otherwise Windows-1252 (common for Excel-exported CSVs).
/// A leading byte-order mark is dropped.
pub fn bytes_as_utf8(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    };
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

fn decode_str(file_name: &str, content: &str, delimiter: u8) -> Result<DecodedTable, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|e| DecodeError::Csv(e.to_string()))?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let Some(names) = &headers else {
            headers = Some(header_names(record.iter()));
            continue;
        };

        let mut row = Fields::new();
        for (col, name) in names.iter().enumerate() {
            let value = record.get(col).unwrap_or("");
            row.insert(name.clone(), Value::String(value.to_string()));
        }
        rows.push(row);
    }

    let headers = headers.ok_or_else(|| DecodeError::Empty(file_name.to_string()))?;
    log::debug!("decoded {}: {} columns, {} rows", file_name, headers.len(), rows.len());
    Ok(DecodedTable { headers, rows })
}

/// Trimmed header names; blank headers get a positional name, repeats get a suffix.
pub(crate) fn header_names<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (idx, name) in raw.enumerate() {
        let base = match name.trim() {
            "" => format!("Column {}", idx + 1),
            trimmed => trimmed.to_string(),
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while names.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        names.push(candidate);
    }
    names
}
