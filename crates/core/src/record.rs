use std::fmt;

use serde_json::Value;

/// User-visible field values of one row, in column order.
pub type Fields = serde_json::Map<String, Value>;

/// Column names owned by the tool rather than the user's data.
/// Never treated as regular fields, never duplicated into exports.
pub const RESERVED_FIELDS: &[&str] = &[
    "cluster_id",
    "record_id",
    "confidence_score",
    "source_file",
    "__source_file",
];

/// Stable identity of an ingested row: position in the upload plus the
/// file it came from. Kept out of `Fields` so it can never leak into the
/// regular export columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub index: usize,
    pub source_file: String,
}

impl RecordId {
    pub fn new(index: usize, source_file: impl Into<String>) -> Self {
        Self { index, source_file: source_file.into() }
    }

    /// Wire form of the id (the row index as a string).
    pub fn wire(&self) -> String {
        self.index.to_string()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index)
    }
}

/// A row with its identity and, for cluster members, the service's score.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub fields: Fields,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordShapeError {
    MissingRecordId,
    BadRecordId(String),
}

impl fmt::Display for RecordShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRecordId => write!(f, "record is missing record_id"),
            Self::BadRecordId(v) => write!(f, "record_id '{v}' is not a row index"),
        }
    }
}

impl std::error::Error for RecordShapeError {}

impl Record {
    pub fn new(id: RecordId, fields: Fields) -> Self {
        Self { id, fields, confidence: None }
    }

    /// Build a record from a service object. Reserved keys are lifted out
    /// of the field map; `record_id` may be a string or an integer.
    pub fn from_wire(mut raw: Fields) -> Result<Self, RecordShapeError> {
        let index = match raw.remove("record_id") {
            Some(Value::String(s)) => s
                .trim()
                .parse::<usize>()
                .map_err(|_| RecordShapeError::BadRecordId(s.clone()))?,
            Some(Value::Number(n)) => n
                .as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| RecordShapeError::BadRecordId(n.to_string()))?,
            Some(other) => return Err(RecordShapeError::BadRecordId(other.to_string())),
            None => return Err(RecordShapeError::MissingRecordId),
        };

        let confidence = match raw.remove("confidence_score") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        let source_file = raw
            .remove("source_file")
            .or_else(|| raw.remove("__source_file"))
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();
        raw.retain(|k, _| !RESERVED_FIELDS.contains(&k.as_str()));

        Ok(Self {
            id: RecordId::new(index, source_file),
            fields: raw,
            confidence,
        })
    }

    /// Object sent back to the service: user fields plus `record_id`.
    pub fn to_wire(&self) -> Fields {
        let mut out = self.fields.clone();
        out.insert("record_id".into(), Value::String(self.id.wire()));
        out
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Render a scalar for delimited-text output.
/// Null and the literal sentinel `N/A` become empty strings.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) if s == "N/A" => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn from_wire_lifts_reserved_keys() {
        let rec = Record::from_wire(obj(json!({
            "Customer": "200087",
            "Name 1": "aldi nord",
            "confidence_score": 0.78,
            "source_file": "KNA2.xlsx",
            "record_id": "184"
        })))
        .unwrap();

        assert_eq!(rec.id, RecordId::new(184, "KNA2.xlsx"));
        assert_eq!(rec.confidence, Some(0.78));
        assert_eq!(rec.fields.len(), 2);
        assert!(rec.get("record_id").is_none());
        assert!(rec.get("source_file").is_none());
    }

    #[test]
    fn from_wire_accepts_numeric_id() {
        let rec = Record::from_wire(obj(json!({"name": "a", "record_id": 7}))).unwrap();
        assert_eq!(rec.id.index, 7);
        assert_eq!(rec.id.source_file, "");
        assert_eq!(rec.confidence, None);
    }

    #[test]
    fn from_wire_rejects_missing_or_bad_id() {
        let err = Record::from_wire(obj(json!({"name": "a"}))).unwrap_err();
        assert_eq!(err, RecordShapeError::MissingRecordId);

        let err = Record::from_wire(obj(json!({"record_id": "abc"}))).unwrap_err();
        assert_eq!(err, RecordShapeError::BadRecordId("abc".into()));
    }

    #[test]
    fn to_wire_carries_id_but_not_source() {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!("acme"));
        let rec = Record::new(RecordId::new(3, "a.csv"), fields);
        let wire = rec.to_wire();
        assert_eq!(wire["record_id"], json!("3"));
        assert_eq!(wire["name"], json!("acme"));
        assert!(!wire.contains_key("source_file"));
    }

    #[test]
    fn format_value_sentinels() {
        assert_eq!(format_value(&Value::Null), "");
        assert_eq!(format_value(&json!("N/A")), "");
        assert_eq!(format_value(&json!("n/a")), "n/a");
        assert_eq!(format_value(&json!(42)), "42");
        assert_eq!(format_value(&json!(true)), "true");
    }
}
