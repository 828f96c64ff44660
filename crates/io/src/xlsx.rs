// Excel decoding (xlsx, xls): first sheet only, first row is the header

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::Value;

use dedupe_core::Fields;

use crate::csv::header_names;
use crate::error::DecodeError;
use crate::DecodedTable;

pub fn decode(file_name: &str, bytes: &[u8]) -> Result<DecodedTable, DecodeError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| DecodeError::Excel(format!("Failed to open Excel file: {}", e)))?;

    let sheet_count = workbook.sheet_names().len();
    if sheet_count > 1 {
        log::info!("{}: {} sheets, reading the first only", file_name, sheet_count);
    }

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DecodeError::Empty(file_name.to_string()))?
        .map_err(|e| DecodeError::Excel(format!("Failed to read first sheet: {}", e)))?;

    let mut rows_iter = range
        .rows()
        .filter(|row| !row.iter().all(|c| matches!(c, Data::Empty)));

    let header_row = rows_iter
        .next()
        .ok_or_else(|| DecodeError::Empty(file_name.to_string()))?;
    let raw_headers: Vec<String> = header_row.iter().map(cell_text).collect();
    let headers = header_names(raw_headers.iter().map(String::as_str));

    let mut rows = Vec::new();
    for cells in rows_iter {
        let mut row = Fields::new();
        for (col, name) in headers.iter().enumerate() {
            let value = cells.get(col).map(cell_value).unwrap_or(Value::Null);
            row.insert(name.clone(), value);
        }
        rows.push(row);
    }

    log::debug!("decoded {}: {} columns, {} rows", file_name, headers.len(), rows.len());
    Ok(DecodedTable { headers, rows })
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Float(n) => {
            // Integral floats read back as integers
            if n.fract() == 0.0 && n.abs() < 1e15 {
                Value::from(*n as i64)
            } else {
                serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number)
            }
        }
        Data::Int(n) => Value::from(*n),
        Data::Bool(b) => Value::Bool(*b),
        Data::Error(e) => Value::String(format!("#{:?}", e)),
        // Serial date number, as the sheet stores it
        Data::DateTime(dt) => cell_value(&Data::Float(dt.as_f64())),
        Data::DateTimeIso(s) => Value::String(s.clone()),
        Data::DurationIso(s) => Value::String(s.clone()),
    }
}

fn cell_text(cell: &Data) -> String {
    match cell_value(cell) {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}
