//! Export Reconciler.
//!
//! Builds the downloadable file from the cluster members (not the whole
//! upload: only clustered records carry cluster metadata), minus an
//! exclusion set of record ids. Both export modes share this path.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use dedupe_core::{format_value, DatasetLedger, DuplicateGroup, Record, RecordId, RESERVED_FIELDS};

use crate::error::WorkflowError;

/// Columns that follow the regular fields, in this order.
pub const TRAILING_COLUMNS: [&str; 3] = ["record_id", "confidence_score", "source_file"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// Every member of every group
    All,
    /// Members not marked for removal
    Cleansed,
}

/// Rows ready for serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A serialized export with its suggested file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub contents: String,
    pub rows: usize,
}

impl ExportFile {
    /// Write into `dir` under the suggested file name.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, WorkflowError> {
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.contents)
            .map_err(|e| WorkflowError::Export(format!("{}: {}", path.display(), e)))?;
        log::info!("wrote {} rows to {}", self.rows, path.display());
        Ok(path)
    }
}

pub fn build_export(
    groups: &[DuplicateGroup],
    ledger: &DatasetLedger,
    exclude: &BTreeSet<RecordId>,
) -> ExportTable {
    let mut ordered: Vec<&DuplicateGroup> = groups.iter().collect();
    ordered.sort_by_key(|g| g.cluster_id);

    let survivors: Vec<(&DuplicateGroup, &Record)> = ordered
        .iter()
        .flat_map(|g| g.members.iter().map(move |m| (*g, m)))
        .filter(|(_, m)| !exclude.contains(&m.id))
        .collect();

    let regular: BTreeSet<&str> = survivors
        .iter()
        .flat_map(|(_, m)| m.fields.keys().map(String::as_str))
        .filter(|k| !RESERVED_FIELDS.contains(k))
        .collect();

    let mut headers = vec!["cluster_id".to_string()];
    headers.extend(regular.iter().map(|s| s.to_string()));
    headers.extend(TRAILING_COLUMNS.iter().map(|s| s.to_string()));

    let mut seen: HashSet<&RecordId> = HashSet::new();
    let mut rows = Vec::with_capacity(survivors.len());
    for (group, record) in survivors {
        if !seen.insert(&record.id) {
            log::warn!("record {} appears in more than one group; exported once", record.id);
            continue;
        }

        let mut row = Vec::with_capacity(headers.len());
        row.push(group.cluster_id.display_number().to_string());
        for field in &regular {
            row.push(record.get(field).map(format_value).unwrap_or_default());
        }
        row.push(record.id.wire());
        row.push(record.confidence.unwrap_or(group.confidence).to_string());
        let source = ledger
            .source_of(record.id.index)
            .unwrap_or(record.id.source_file.as_str());
        row.push(source.to_string());
        rows.push(row);
    }

    ExportTable { headers, rows }
}

impl ExportTable {
    /// Comma-separated, header row first, `\n` line endings.
    pub fn to_csv(&self) -> Result<String, WorkflowError> {
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Necessary)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer
            .write_record(&self.headers)
            .map_err(|e| WorkflowError::Export(e.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|e| WorkflowError::Export(e.to_string()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| WorkflowError::Export(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| WorkflowError::Export(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dedupe_core::{ClusterId, Fields, SourceRows};
    use serde_json::json;

    fn fields(v: serde_json::Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    fn member(index: usize, v: serde_json::Value, score: Option<f64>) -> Record {
        let mut r = Record::new(RecordId::new(index, "people.csv"), fields(v));
        r.confidence = score;
        r
    }

    fn ledger() -> DatasetLedger {
        DatasetLedger::from_sources(vec![
            SourceRows::new("people.csv", vec![Fields::new(), Fields::new()]),
            SourceRows::new("crm.csv", vec![Fields::new(), Fields::new()]),
        ])
    }

    #[test]
    fn column_order_and_values() {
        let groups = vec![DuplicateGroup::new(
            ClusterId(0),
            0.8,
            vec![
                member(0, json!({"name": "ann", "city": "oslo"}), Some(0.75)),
                member(2, json!({"name": "anne", "zip": "0150"}), None),
            ],
        )];
        let table = build_export(&groups, &ledger(), &BTreeSet::new());

        assert_eq!(
            table.headers,
            vec!["cluster_id", "city", "name", "zip", "record_id", "confidence_score", "source_file"]
        );
        assert_eq!(table.rows[0], vec!["1", "oslo", "ann", "", "0", "0.75", "people.csv"]);
        // group score as fallback, origin looked up in the ledger
        assert_eq!(table.rows[1], vec!["1", "", "anne", "0150", "2", "0.8", "crm.csv"]);
    }

    #[test]
    fn csv_escaping_and_sentinels() {
        let groups = vec![DuplicateGroup::new(
            ClusterId(4),
            1.0,
            vec![member(1, json!({"a": "a,b\"c", "b": "N/A", "c": null, "d": "two\nlines"}), None)],
        )];
        let csv = build_export(&groups, &ledger(), &BTreeSet::new()).to_csv().unwrap();
        assert_eq!(
            csv,
            "cluster_id,a,b,c,d,record_id,confidence_score,source_file\n\
             5,\"a,b\"\"c\",,,\"two\nlines\",1,1,people.csv\n"
        );
    }

    #[test]
    fn carriage_returns_are_quoted() {
        let groups = vec![DuplicateGroup::new(
            ClusterId(0),
            0.5,
            vec![member(1, json!({"note": "a\rb", "name": "plain"}), None)],
        )];
        let csv = build_export(&groups, &ledger(), &BTreeSet::new()).to_csv().unwrap();
        assert_eq!(
            csv,
            "cluster_id,name,note,record_id,confidence_score,source_file\n\
             1,plain,\"a\rb\",1,0.5,people.csv\n"
        );
    }

    #[test]
    fn reserved_fields_never_duplicated() {
        let mut r = member(0, json!({"name": "x"}), None);
        r.fields.insert("cluster_id".into(), json!("99"));
        r.fields.insert("__source_file".into(), json!("old.csv"));
        let groups = vec![DuplicateGroup::new(ClusterId(0), 0.5, vec![r])];
        let table = build_export(&groups, &ledger(), &BTreeSet::new());
        assert_eq!(table.headers.iter().filter(|h| *h == "cluster_id").count(), 1);
        assert!(!table.headers.iter().any(|h| h == "__source_file"));
    }

    #[test]
    fn exclusion_to_empty_is_headers_only() {
        let groups = vec![DuplicateGroup::new(
            ClusterId(0),
            0.5,
            vec![member(0, json!({"name": "x"}), None)],
        )];
        let exclude: BTreeSet<RecordId> = [RecordId::new(0, "people.csv")].into_iter().collect();
        let table = build_export(&groups, &ledger(), &exclude);
        assert!(table.rows.is_empty());
        assert_eq!(
            table.to_csv().unwrap(),
            "cluster_id,record_id,confidence_score,source_file\n"
        );
    }

    #[test]
    fn groups_exported_in_cluster_order() {
        let groups = vec![
            DuplicateGroup::new(ClusterId(2), 0.5, vec![member(1, json!({}), None)]),
            DuplicateGroup::new(ClusterId(0), 0.5, vec![member(0, json!({}), None)]),
        ];
        let table = build_export(&groups, &ledger(), &BTreeSet::new());
        let clusters: Vec<&str> = table.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(clusters, vec!["1", "3"]);
    }

    #[test]
    fn write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = ExportFile {
            file_name: "out.csv".into(),
            contents: "cluster_id\n".into(),
            rows: 0,
        };
        let path = file.write_to(dir.path()).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "cluster_id\n");
    }
}
