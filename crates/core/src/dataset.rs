//! Dataset Ledger: the parsed rows of the current upload.
//!
//! Every row is stamped with a `RecordId` whose index is its position
//! across the whole upload (file one first, then file two) and whose
//! source tag names the file it came from. The ledger is built once and
//! never mutated; a re-upload replaces it wholesale.

use crate::record::{Fields, Record, RecordId, RESERVED_FIELDS};

/// Rows decoded from one uploaded file.
#[derive(Debug, Clone, Default)]
pub struct SourceRows {
    pub file_name: String,
    pub rows: Vec<Fields>,
}

impl SourceRows {
    pub fn new(file_name: impl Into<String>, rows: Vec<Fields>) -> Self {
        Self { file_name: file_name.into(), rows }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatasetLedger {
    sources: Vec<String>,
    records: Vec<Record>,
    fields: Vec<String>,
}

impl DatasetLedger {
    pub fn from_sources(sources: Vec<SourceRows>) -> Self {
        let mut ledger = Self::default();

        for source in sources {
            for mut row in source.rows {
                row.retain(|k, _| !RESERVED_FIELDS.contains(&k.as_str()));
                for key in row.keys() {
                    if !ledger.fields.iter().any(|f| f == key) {
                        ledger.fields.push(key.clone());
                    }
                }
                let id = RecordId::new(ledger.records.len(), source.file_name.clone());
                ledger.records.push(Record::new(id, row));
            }
            ledger.sources.push(source.file_name);
        }

        ledger
    }

    pub fn single(file_name: impl Into<String>, rows: Vec<Fields>) -> Self {
        Self::from_sources(vec![SourceRows::new(file_name, rows)])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// Origin file of the row at `index`.
    pub fn source_of(&self, index: usize) -> Option<&str> {
        self.records.get(index).map(|r| r.id.source_file.as_str())
    }

    /// Field names in first-seen order (reserved columns excluded).
    pub fn field_names(&self) -> &[String] {
        &self.fields
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Canonical id for a record reached through a service response:
    /// the index is trusted, the source tag comes from this ledger.
    pub fn resolve(&self, id: &RecordId) -> RecordId {
        match self.source_of(id.index) {
            Some(source) => RecordId::new(id.index, source),
            None => id.clone(),
        }
    }
}
