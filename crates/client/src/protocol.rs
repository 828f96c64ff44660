//! Request/response contract of the `/dedupe` endpoint.

use serde::Deserialize;
use serde_json::Value;

use dedupe_core::{
    validate_field_selection, ClusterId, DuplicateGroup, Fields, Record, TrainingPair,
    ValidationError,
};

use crate::client::RemoteFailure;

/// Fixed threshold sent with every request.
pub const SIMILARITY_THRESHOLD: &str = "0.2";

/// Response status that carries candidate pairs instead of groups.
pub const STATUS_NEEDS_TRAINING: &str = "needs_training";

/// The file part of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), bytes }
    }
}

/// One submission to the matching service.
#[derive(Debug, Clone)]
pub struct DedupRequest {
    pub file: Upload,
    pub selected_columns: Option<Vec<String>>,
    pub training_data: Option<Vec<TrainingPair>>,
    pub is_reprocessing: bool,
}

impl DedupRequest {
    /// Validated constructor: fewer than two distinct fields never leaves the client.
    pub fn new(
        file: Upload,
        selected_columns: Vec<String>,
        training_data: Option<Vec<TrainingPair>>,
        is_reprocessing: bool,
    ) -> Result<Self, ValidationError> {
        validate_field_selection(&selected_columns)?;
        Ok(Self {
            file,
            selected_columns: Some(selected_columns),
            training_data,
            is_reprocessing,
        })
    }

    /// JSON for the `training_data` part (`null` when there is none).
    pub fn training_data_json(&self) -> String {
        match &self.training_data {
            Some(pairs) => serde_json::to_string(pairs).unwrap_or_else(|_| "null".into()),
            None => "null".into(),
        }
    }

    /// Text parts of the multipart form, in send order.
    pub fn text_parts(&self) -> Vec<(&'static str, String)> {
        let mut parts = vec![
            ("similarity_threshold", SIMILARITY_THRESHOLD.to_string()),
            ("training_data", self.training_data_json()),
        ];
        if self.is_reprocessing {
            parts.push(("is_reprocessing", "true".to_string()));
        }
        if let Some(cols) = &self.selected_columns {
            parts.push((
                "selected_columns",
                serde_json::to_string(cols).unwrap_or_else(|_| "[]".into()),
            ));
        }
        parts
    }

    pub fn labeled_pair_count(&self) -> usize {
        self.training_data.as_ref().map_or(0, Vec::len)
    }
}

/// What the service answered.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupResponse {
    /// Unlabeled candidate pairs, kept raw so shape problems surface in the
    /// training session rather than failing the whole call.
    NeedsTraining(Vec<Value>),
    /// Clustering result (possibly empty).
    Groups(Vec<DuplicateGroup>),
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    pairs: Option<Vec<Value>>,
    #[serde(default)]
    duplicates: Option<Vec<WireGroup>>,
}

#[derive(Debug, Deserialize)]
struct WireGroup {
    cluster_id: u64,
    #[serde(default)]
    confidence_score: Option<f64>,
    #[serde(default)]
    records: Vec<Fields>,
}

/// Interpret a response body. Anything that does not fit one of the two
/// shapes is a malformed body.
pub fn parse_response(body: Value) -> Result<DedupResponse, RemoteFailure> {
    let wire: WireResponse =
        serde_json::from_value(body).map_err(|e| RemoteFailure::Parse(e.to_string()))?;

    if wire.status == STATUS_NEEDS_TRAINING {
        let pairs = wire.pairs.ok_or_else(|| {
            RemoteFailure::Parse("needs_training response without pairs".into())
        })?;
        return Ok(DedupResponse::NeedsTraining(pairs));
    }

    let mut groups = Vec::new();
    for group in wire.duplicates.unwrap_or_default() {
        let mut members = Vec::with_capacity(group.records.len());
        for raw in group.records {
            let record = Record::from_wire(raw).map_err(|e| {
                RemoteFailure::Parse(format!("cluster {}: {e}", group.cluster_id))
            })?;
            members.push(record);
        }
        let confidence = group
            .confidence_score
            .unwrap_or_else(|| mean_member_score(&members));
        groups.push(DuplicateGroup::new(ClusterId(group.cluster_id), confidence, members));
    }

    Ok(DedupResponse::Groups(groups))
}

fn mean_member_score(members: &[Record]) -> f64 {
    let scores: Vec<f64> = members.iter().filter_map(|m| m.confidence).collect();
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dedupe_core::Answer;
    use serde_json::json;

    fn upload() -> Upload {
        Upload::new("customers.csv", b"name,city\nacme,riga\n".to_vec())
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn request_rejects_single_column() {
        let err = DedupRequest::new(upload(), cols(&["name"]), None, false).unwrap_err();
        assert_eq!(err, ValidationError::TooFewColumns { selected: 1 });
    }

    #[test]
    fn text_parts_for_first_submission() {
        let req = DedupRequest::new(upload(), cols(&["name", "city"]), None, false).unwrap();
        let parts = req.text_parts();
        assert_eq!(parts[0], ("similarity_threshold", "0.2".to_string()));
        assert_eq!(parts[1], ("training_data", "null".to_string()));
        assert_eq!(parts[2], ("selected_columns", r#"["name","city"]"#.to_string()));
        assert!(!parts.iter().any(|(k, _)| *k == "is_reprocessing"));
    }

    #[test]
    fn text_parts_for_reprocess() {
        let pair = TrainingPair::from_wire(json!([{"name": "a"}, {"name": "b"}]))
            .unwrap()
            .with_answer(Answer::Yes);
        let req = DedupRequest::new(upload(), cols(&["name", "city"]), Some(vec![pair]), true).unwrap();
        let parts = req.text_parts();
        let training: Value = serde_json::from_str(&parts[1].1).unwrap();
        assert_eq!(training, json!([{"0": {"name": "a"}, "1": {"name": "b"}, "answer": "y"}]));
        assert!(parts.contains(&("is_reprocessing", "true".to_string())));
        assert_eq!(req.labeled_pair_count(), 1);
    }

    #[test]
    fn parse_needs_training() {
        let resp = parse_response(json!({
            "status": "needs_training",
            "pairs": [{"0": {"a": 1}, "1": {"a": 2}}]
        }))
        .unwrap();
        match resp {
            DedupResponse::NeedsTraining(pairs) => assert_eq!(pairs.len(), 1),
            other => panic!("expected pairs, got {other:?}"),
        }
    }

    #[test]
    fn parse_needs_training_without_pairs_is_malformed() {
        let err = parse_response(json!({"status": "needs_training"})).unwrap_err();
        assert!(matches!(err, RemoteFailure::Parse(_)));
    }

    #[test]
    fn parse_groups() {
        let resp = parse_response(json!({
            "status": "success",
            "duplicates": [{
                "cluster_id": 15,
                "group_size": 2,
                "confidence_score": 0.78,
                "records": [
                    {"name": "aldi", "record_id": "184", "confidence_score": 0.7, "source_file": "k.xlsx"},
                    {"name": "aldi", "record_id": "401", "confidence_score": 0.8}
                ]
            }]
        }))
        .unwrap();

        let DedupResponse::Groups(groups) = resp else {
            panic!("expected groups");
        };
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].cluster_id, ClusterId(15));
        assert_eq!(groups[0].confidence, 0.78);
        assert_eq!(groups[0].members[0].id.index, 184);
        assert_eq!(groups[0].members[1].confidence, Some(0.8));
    }

    #[test]
    fn parse_groups_missing_list_is_empty() {
        let resp = parse_response(json!({"status": "success"})).unwrap();
        assert_eq!(resp, DedupResponse::Groups(vec![]));
    }

    #[test]
    fn parse_group_score_falls_back_to_members() {
        let resp = parse_response(json!({
            "status": "success",
            "duplicates": [{
                "cluster_id": 0,
                "records": [
                    {"record_id": 1, "confidence_score": 0.5},
                    {"record_id": 2, "confidence_score": 1.0}
                ]
            }]
        }))
        .unwrap();
        let DedupResponse::Groups(groups) = resp else {
            panic!("expected groups");
        };
        assert_eq!(groups[0].confidence, 0.75);
    }

    #[test]
    fn parse_member_without_id_is_malformed() {
        let err = parse_response(json!({
            "status": "success",
            "duplicates": [{"cluster_id": 3, "records": [{"name": "x"}]}]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("cluster 3"));
    }
}
